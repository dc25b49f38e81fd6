use crate::homography::Homography;

/// In-plane rotation encoded by a homography, in degrees within `(-180, 180]`.
///
/// Reads the rotation from the first column of the upper-left block,
/// `atan2(H[1][0], H[0][0])`, ignoring scale, shear and perspective.
pub fn rotation_angle_degrees(h: &Homography) -> f64 {
    h.at(1, 0).atan2(h.at(0, 0)).to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_quarter_turn() {
        let h = Homography::from_rows([[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]]);
        assert_eq!(rotation_angle_degrees(&h), 90.0);
    }

    #[test]
    fn test_identity_is_zero() {
        assert_eq!(rotation_angle_degrees(&Homography::identity()), 0.0);
    }

    #[test]
    fn test_half_turn() {
        let h = Homography::from_rows([[-1.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, 1.0]]);
        assert_eq!(rotation_angle_degrees(&h), 180.0);
    }

    #[test]
    fn test_scale_does_not_change_angle() {
        let t = 30f64.to_radians();
        let s = 2.5;
        let h = Homography::from_rows([
            [s * t.cos(), -s * t.sin(), 12.0],
            [s * t.sin(), s * t.cos(), -3.0],
            [0.0, 0.0, 1.0],
        ]);
        assert!((rotation_angle_degrees(&h) - 30.0).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn recovers_rotation(
            deg in -179.0f64..179.0,
            tx in -100.0f64..100.0,
            ty in -100.0f64..100.0,
        ) {
            let t = deg.to_radians();
            let h = Homography::from_rows([
                [t.cos(), -t.sin(), tx],
                [t.sin(), t.cos(), ty],
                [0.0, 0.0, 1.0],
            ]);
            let a = rotation_angle_degrees(&h);
            prop_assert!((a - deg).abs() < 1e-9);
            prop_assert_eq!(a, rotation_angle_degrees(&h));
        }
    }
}
