use sift_core::{Correspondences, Keypoint, Match, Point};

/// Fraction of each dimension excluded at every image border
pub const BOUNDARY_PERCENTAGE: f64 = 0.1;

/// Inclusive interior rectangle of an image, in whole pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub min_x: i64,
    pub max_x: i64,
    pub min_y: i64,
    pub max_y: i64,
}

impl Region {
    /// Interior of a `width x height` image after trimming the border band
    pub fn interior(width: usize, height: usize) -> Self {
        let lo = |n: usize| (n as f64 * BOUNDARY_PERCENTAGE) as i64;
        let hi = |n: usize| (n as f64 * (1.0 - BOUNDARY_PERCENTAGE)) as i64;
        Self { min_x: lo(width), max_x: hi(width), min_y: lo(height), max_y: hi(height) }
    }

    pub fn contains(&self, p: Point) -> bool {
        let (x, y) = (p.x as f64, p.y as f64);
        (self.min_x as f64..=self.max_x as f64).contains(&x)
            && (self.min_y as f64..=self.max_y as f64).contains(&y)
    }
}

/// Whether `p` lies inside the interior of a `width x height` image
pub fn within_region(p: Point, width: usize, height: usize) -> bool {
    Region::interior(width, height).contains(p)
}

/// Drops matches whose endpoints fall into the border band of either image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionFilter {
    source: Region,
    target: Region,
}

impl RegionFilter {
    pub fn new(source_size: (usize, usize), target_size: (usize, usize)) -> Self {
        Self {
            source: Region::interior(source_size.0, source_size.1),
            target: Region::interior(target_size.0, target_size.1),
        }
    }

    /// Both endpoints must be inside their own image's interior
    pub fn accepts(&self, source: Point, target: Point) -> bool {
        self.source.contains(source) && self.target.contains(target)
    }

    /// Correspondences for the accepted matches, in match order.
    /// `query` indexes `source_keypoints`, `train` indexes `target_keypoints`.
    pub fn correspondences(
        &self,
        matches: &[Match],
        source_keypoints: &[Keypoint],
        target_keypoints: &[Keypoint],
    ) -> Correspondences {
        let filtered: Correspondences = matches
            .iter()
            .filter_map(|m| {
                let src = source_keypoints.get(m.query)?.point();
                let dst = target_keypoints.get(m.train)?.point();
                self.accepts(src, dst).then_some((src, dst))
            })
            .collect();
        log::debug!("region filter kept {} of {} matches", filtered.len(), matches.len());
        filtered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn kp(x: f32, y: f32) -> Keypoint {
        Keypoint { x, y, size: 2.0, angle: 0.0, response: 1.0, octave: 0 }
    }

    #[test]
    fn test_interior_bounds() {
        let r = Region::interior(100, 50);
        assert_eq!(r, Region { min_x: 10, max_x: 90, min_y: 5, max_y: 45 });
        // truncation, not rounding
        let r = Region::interior(333, 19);
        assert_eq!((r.min_x, r.max_x), (33, 299));
        assert_eq!((r.min_y, r.max_y), (1, 17));
    }

    #[test]
    fn test_boundary_is_inclusive() {
        assert!(within_region(Point::new(10.0, 50.0), 100, 100));
        assert!(within_region(Point::new(90.0, 90.0), 100, 100));
        assert!(!within_region(Point::new(9.0, 50.0), 100, 100));
        assert!(!within_region(Point::new(90.5, 50.0), 100, 100));
        assert!(!within_region(Point::new(50.0, 9.99), 100, 100));
    }

    #[test]
    fn test_match_needs_both_endpoints() {
        let filter = RegionFilter::new((100, 100), (200, 200));
        assert!(filter.accepts(Point::new(50.0, 50.0), Point::new(150.0, 150.0)));
        assert!(!filter.accepts(Point::new(50.0, 50.0), Point::new(195.0, 150.0)));
        assert!(!filter.accepts(Point::new(5.0, 50.0), Point::new(150.0, 150.0)));
    }

    #[test]
    fn test_correspondences_keep_match_order() {
        let filter = RegionFilter::new((100, 100), (100, 100));
        let src = [kp(20.0, 20.0), kp(2.0, 2.0), kp(60.0, 70.0)];
        let dst = [kp(30.0, 30.0), kp(80.0, 40.0), kp(50.0, 50.0)];
        let matches = [
            Match { query: 2, train: 1, distance: 1.0 },
            Match { query: 1, train: 0, distance: 1.0 },
            Match { query: 0, train: 2, distance: 1.0 },
        ];
        let c = filter.correspondences(&matches, &src, &dst);
        assert_eq!(c.len(), 2);
        assert_eq!(c.src()[0], Point::new(60.0, 70.0));
        assert_eq!(c.dst()[0], Point::new(80.0, 40.0));
        assert_eq!(c.src()[1], Point::new(20.0, 20.0));
    }

    proptest! {
        #[test]
        fn border_band_is_always_rejected(w in 20usize..2000, h in 20usize..2000, t in 0f32..0.99) {
            let r = Region::interior(w, h);
            let x = t * r.min_x as f32;
            prop_assert!(!within_region(Point::new(x, h as f32 / 2.0), w, h));
            prop_assert!(!within_region(Point::new(w as f32 - x, h as f32 / 2.0), w, h));
            prop_assert!(within_region(Point::new(w as f32 / 2.0, h as f32 / 2.0), w, h));
        }
    }
}
