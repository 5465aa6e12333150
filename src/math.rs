use vek::Vec3;

/// Length below which a direction cannot be recovered from a vector.
const DEGENERATE_LENGTH: f64 = 1e-12;

/// Normalize a vector, returning zero when the input is degenerate.
///
/// Two lattice nodes can momentarily coincide, every consumer treats the zero
/// direction as "no force" instead of dividing by zero.
pub fn normalize_or_zero(v: Vec3<f64>) -> Vec3<f64> {
    let magnitude = v.magnitude();

    if magnitude < DEGENERATE_LENGTH {
        Vec3::zero()
    } else {
        v / magnitude
    }
}

#[cfg(test)]
mod tests {
    use super::normalize_or_zero;
    use vek::Vec3;

    #[test]
    fn normalize_guards_degenerate_input() {
        assert_eq!(normalize_or_zero(Vec3::zero()), Vec3::zero());
        assert_eq!(normalize_or_zero(Vec3::broadcast(1e-300)), Vec3::zero());

        let unit = normalize_or_zero(Vec3::new(3.0, 0.0, -4.0));
        assert!((unit.magnitude() - 1.0).abs() < 1e-12);
        assert!((unit.x - 0.6).abs() < 1e-12);
        assert!((unit.z + 0.8).abs() < 1e-12);
    }
}
