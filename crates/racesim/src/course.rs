//! Course model and geodesic helpers.
//!
//! Courses are immutable for the lifetime of a race and shared read-only by every athlete.
//! Points follow the `geo` convention: `x` is longitude, `y` is latitude.

use geo::{Bearing, Destination, Distance, Haversine, Point};

use crate::errors::SimError;
use crate::models::Discipline;

/// Ordered waypoints for one discipline plus the leg indices that carry timing mats.
#[derive(Debug, Clone)]
pub struct DisciplineCourse {
    waypoints: Vec<Point<f64>>,
    timing_mats: Vec<usize>,
    official_distance_m: f64,
    length_m: f64,
}

impl DisciplineCourse {
    /// Builds a discipline course from `(lat, lon)` pairs.
    pub fn new(
        waypoints: &[(f64, f64)],
        timing_mats: Vec<usize>,
        official_distance_m: f64,
    ) -> Result<Self, SimError> {
        if waypoints.len() < 2 {
            return Err(SimError::Course(format!(
                "a course needs at least 2 waypoints, got {}",
                waypoints.len()
            )));
        }
        if official_distance_m <= 0.0 {
            return Err(SimError::Course(format!(
                "official distance must be positive, got {official_distance_m}"
            )));
        }
        let last = waypoints.len() - 1;
        if let Some(bad) = timing_mats.iter().find(|&&leg| leg == 0 || leg > last) {
            return Err(SimError::Course(format!(
                "timing mat at leg {bad} is outside 1..={last}"
            )));
        }

        let waypoints: Vec<Point<f64>> = waypoints
            .iter()
            .map(|&(lat, lon)| Point::new(lon, lat))
            .collect();
        let length_m = waypoints
            .windows(2)
            .map(|pair| distance(pair[0], pair[1]))
            .sum();

        Ok(Self {
            waypoints,
            timing_mats,
            official_distance_m,
            length_m,
        })
    }

    pub fn waypoint(&self, index: usize) -> Point<f64> {
        self.waypoints[index]
    }

    pub fn start(&self) -> Point<f64> {
        self.waypoints[0]
    }

    /// Index of the final waypoint; reaching it completes the discipline.
    pub fn last_leg(&self) -> usize {
        self.waypoints.len() - 1
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// 1-based mat number if arriving at `leg` crosses a timing mat.
    pub fn mat_at(&self, leg: usize) -> Option<usize> {
        self.timing_mats
            .iter()
            .position(|&mat| mat == leg)
            .map(|i| i + 1)
    }

    pub fn timing_mats(&self) -> &[usize] {
        &self.timing_mats
    }

    pub fn official_distance_m(&self) -> f64 {
        self.official_distance_m
    }

    /// Polyline length in meters.
    pub fn length_m(&self) -> f64 {
        self.length_m
    }

    /// Ratio of polyline length to official distance.
    pub fn length_correction(&self) -> f64 {
        self.length_m / self.official_distance_m
    }
}

/// The swim, bike and run courses of one race.
#[derive(Debug, Clone)]
pub struct Course {
    pub name: String,
    pub swim: DisciplineCourse,
    pub bike: DisciplineCourse,
    pub run: DisciplineCourse,
}

impl Course {
    pub fn get(&self, discipline: Discipline) -> &DisciplineCourse {
        match discipline {
            Discipline::Swim => &self.swim,
            Discipline::Bike => &self.bike,
            Discipline::Run => &self.run,
        }
    }
}

/// Great-circle distance in meters.
pub fn distance(from: Point<f64>, to: Point<f64>) -> f64 {
    Haversine.distance(from, to)
}

/// Initial bearing from `from` to `to`, in degrees clockwise from north (0..360).
pub fn bearing(from: Point<f64>, to: Point<f64>) -> f64 {
    let b = Haversine.bearing(from, to);
    if b < 0.0 { b + 360.0 } else { b }
}

/// Moves `meters` from `from` toward `to` along the great circle.
pub fn move_along(from: Point<f64>, to: Point<f64>, meters: f64) -> Point<f64> {
    Haversine.destination(from, bearing(from, to), meters)
}

/// Point at `fraction` (0..1) of the way from `from` to `to`.
pub fn interpolate(from: Point<f64>, to: Point<f64>, fraction: f64) -> Point<f64> {
    let fraction = fraction.clamp(0.0, 1.0);
    move_along(from, to, distance(from, to) * fraction)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_course() -> DisciplineCourse {
        DisciplineCourse::new(
            &[(19.64, -155.99), (19.65, -155.99), (19.66, -155.99)],
            vec![1],
            2000.0,
        )
        .unwrap()
    }

    #[test]
    fn test_haversine() {
        // ~111km for 1 degree of latitude
        let dist = distance(Point::new(0.0, 0.0), Point::new(0.0, 1.0));
        assert!((dist - 111_000.0).abs() < 1000.0);
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        let origin = Point::new(-155.99, 19.64);
        let north = Point::new(-155.99, 19.65);
        let west = Point::new(-156.0, 19.64);
        assert!(bearing(origin, north).abs() < 0.01);
        assert!((bearing(origin, west) - 270.0).abs() < 0.1);
    }

    #[test]
    fn test_move_along_stays_on_line() {
        let from = Point::new(-155.99, 19.64);
        let to = Point::new(-155.99, 19.66);
        let moved = move_along(from, to, 500.0);
        assert!((distance(from, moved) - 500.0).abs() < 0.5);
        assert!((moved.x() - from.x()).abs() < 1e-6);
    }

    #[test]
    fn test_interpolate_midpoint() {
        let from = Point::new(-155.99, 19.64);
        let to = Point::new(-155.99, 19.66);
        let mid = interpolate(from, to, 0.5);
        assert!((distance(from, mid) - distance(mid, to)).abs() < 0.5);
    }

    #[test]
    fn test_length_and_correction() {
        let course = sample_course();
        assert!((course.length_m() - 2224.0).abs() < 20.0);
        assert!(course.length_correction() > 1.0);
        assert_eq!(course.last_leg(), 2);
    }

    #[test]
    fn test_mat_numbers_are_one_based() {
        let course = sample_course();
        assert_eq!(course.mat_at(1), Some(1));
        assert_eq!(course.mat_at(2), None);
    }

    #[test]
    fn test_rejects_degenerate_courses() {
        assert!(DisciplineCourse::new(&[(19.64, -155.99)], vec![], 100.0).is_err());
        assert!(
            DisciplineCourse::new(&[(19.64, -155.99), (19.65, -155.99)], vec![5], 100.0).is_err()
        );
        assert!(
            DisciplineCourse::new(&[(19.64, -155.99), (19.65, -155.99)], vec![], 0.0).is_err()
        );
    }
}
