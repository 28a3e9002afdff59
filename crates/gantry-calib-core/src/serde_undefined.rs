//! Serde adapters that write undefined (NaN) coordinates as `null`.
//!
//! JSON has no NaN; `serde_json` writes it as `null` and then refuses to
//! read `null` back as a float. Fields holding positions with undefined
//! samples use these modules through `#[serde(with = ...)]`.

use serde::{Deserialize, Deserializer, Serializer};

use crate::math::{Real, Vec3};

type Encoded = [Option<Real>; 3];

fn defined(v: Real) -> Option<Real> {
    (!v.is_nan()).then_some(v)
}

fn encode(p: &Vec3) -> Encoded {
    [defined(p.x), defined(p.y), defined(p.z)]
}

fn decode(e: Encoded) -> Vec3 {
    Vec3::from_fn(|i, _| e[i].unwrap_or(Real::NAN))
}

/// `Vec<Real>`.
pub mod values {
    use super::*;

    pub fn serialize<S: Serializer>(values: &[Real], s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(values.iter().map(|&v| defined(v)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Real>, D::Error> {
        let raw: Vec<Option<Real>> = Vec::deserialize(d)?;
        Ok(raw.into_iter().map(|v| v.unwrap_or(Real::NAN)).collect())
    }
}

/// `Vec<Vec3>`.
pub mod points {
    use super::*;

    pub fn serialize<S: Serializer>(points: &[Vec3], s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(points.iter().map(encode))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec3>, D::Error> {
        let raw: Vec<Encoded> = Vec::deserialize(d)?;
        Ok(raw.into_iter().map(decode).collect())
    }
}

/// `Vec<Vec<Vec3>>`.
pub mod point_sets {
    use super::*;

    pub fn serialize<S: Serializer>(sets: &[Vec<Vec3>], s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(
            sets.iter()
                .map(|set| set.iter().map(encode).collect::<Vec<_>>()),
        )
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec<Vec3>>, D::Error> {
        let raw: Vec<Vec<Encoded>> = Vec::deserialize(d)?;
        Ok(raw
            .into_iter()
            .map(|set| set.into_iter().map(decode).collect())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use crate::math::{Real, Vec3, undefined_vec3};

    #[derive(Debug, Serialize, Deserialize)]
    struct Holder {
        #[serde(with = "super::points")]
        points: Vec<Vec3>,
        #[serde(with = "super::values")]
        values: Vec<Real>,
    }

    #[test]
    fn undefined_survives_json() {
        let holder = Holder {
            points: vec![Vec3::new(1.0, Real::NAN, 3.0), undefined_vec3()],
            values: vec![Real::NAN, 2.5],
        };
        let json = serde_json::to_string(&holder).unwrap();
        assert_eq!(
            json,
            r#"{"points":[[1.0,null,3.0],[null,null,null]],"values":[null,2.5]}"#
        );
        let back: Holder = serde_json::from_str(&json).unwrap();
        assert_eq!(back.points[0].x, 1.0);
        assert!(back.points[0].y.is_nan());
        assert!(back.points[1].z.is_nan());
        assert!(back.values[0].is_nan());
        assert_eq!(back.values[1], 2.5);
    }
}
