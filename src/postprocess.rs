//! Detection clustering (C8).
//!
//! Grounded on `RealTimeFaceDetection::IsTheSameFace` and
//! `RealTimeFaceDetection::PostProcessFaces` in `RealTimeFaceDetection.cpp`:
//! a union-find-like relabeling over raw detections, each final cluster
//! collapsed to the componentwise mean of its members.

use crate::util::{line_segment_overlap, Rect};

/// Clusters raw detection rectangles and emits one rectangle per cluster,
/// the componentwise arithmetic mean (integer truncation) of its members.
/// Order-independent: permuting `rects` yields the same final cluster set
/// (spec property 7), since labels always rename to the smaller of the two
/// merging labels and the mean is commutative.
pub fn cluster(rects: &[Rect]) -> Vec<Rect> {
    let mut labels: Vec<usize> = (0..rects.len()).collect();

    for i in 0..rects.len() {
        for j in (i + 1)..rects.len() {
            if !is_same_face(&rects[i], &rects[j]) {
                continue;
            }
            let (li, lj) = (labels[i], labels[j]);
            if li == lj {
                continue;
            }
            let (keep, rename) = if li < lj { (li, lj) } else { (lj, li) };
            for l in labels.iter_mut() {
                if *l == rename {
                    *l = keep;
                }
            }
        }
    }

    let mut distinct: Vec<usize> = labels.clone();
    distinct.sort_unstable();
    distinct.dedup();

    distinct
        .into_iter()
        .map(|label| {
            let members: Vec<&Rect> = rects
                .iter()
                .zip(labels.iter())
                .filter(|(_, &l)| l == label)
                .map(|(r, _)| r)
                .collect();
            mean_rect(&members)
        })
        .collect()
}

/// Two rectangles belong to the same face iff the overlap covers more than
/// half of *either* rectangle's area (`simA > 0.5 || simB > 0.5`). Unlike
/// the similarity test in candidate pruning, this is an OR of the two
/// ratios, not their min -- a small rectangle nested entirely inside a
/// larger one (the common cross-scale case) must still merge even though
/// the overlap covers only a small fraction of the larger rectangle.
fn is_same_face(a: &Rect, b: &Rect) -> bool {
    let h_overlap = line_segment_overlap(a.y, a.h, b.y, b.h);
    let w_overlap = line_segment_overlap(a.x, a.w, b.x, b.w);
    let overlap_area = (h_overlap * w_overlap) as f64;
    let area_a = (a.h * a.w) as f64;
    let area_b = (b.h * b.w) as f64;
    let sim_a = overlap_area / area_a;
    let sim_b = overlap_area / area_b;
    sim_a > 0.5 || sim_b > 0.5
}

fn mean_rect(members: &[&Rect]) -> Rect {
    let n = members.len() as i64;
    Rect::new(
        members.iter().map(|r| r.y).sum::<i64>() / n,
        members.iter().map(|r| r.x).sum::<i64>() / n,
        members.iter().map(|r| r.h).sum::<i64>() / n,
        members.iter().map(|r| r.w).sum::<i64>() / n,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s4_cluster_merging() {
        let rects = vec![
            Rect::new(0, 0, 20, 20),
            Rect::new(5, 5, 20, 20),
            Rect::new(100, 100, 20, 20),
        ];
        let mut clustered = cluster(&rects);
        clustered.sort_by_key(|r| (r.y, r.x));
        assert_eq!(clustered, vec![Rect::new(2, 2, 20, 20), Rect::new(100, 100, 20, 20)]);
    }

    #[test]
    fn cluster_is_order_independent() {
        let rects = vec![
            Rect::new(100, 100, 20, 20),
            Rect::new(5, 5, 20, 20),
            Rect::new(0, 0, 20, 20),
        ];
        let mut clustered = cluster(&rects);
        clustered.sort_by_key(|r| (r.y, r.x));
        assert_eq!(clustered, vec![Rect::new(2, 2, 20, 20), Rect::new(100, 100, 20, 20)]);
    }

    #[test]
    fn nested_cross_scale_rects_merge() {
        // A 20x20 rect fully inside a 40x40 rect: simA = 400/400 = 1.0,
        // simB = 400/1600 = 0.25. Only simA clears 0.5, so this must merge
        // under OR semantics even though the min of the two ratios would not.
        let rects = vec![Rect::new(10, 10, 20, 20), Rect::new(0, 0, 40, 40)];
        let clustered = cluster(&rects);
        assert_eq!(clustered.len(), 1);
    }

    #[test]
    fn disjoint_rects_stay_separate() {
        let rects = vec![Rect::new(0, 0, 10, 10), Rect::new(50, 50, 10, 10)];
        let clustered = cluster(&rects);
        assert_eq!(clustered.len(), 2);
    }
}
