//! Job report wire form (spec §6).
//!
//! Fields are packed in order `start-sec`, `start-usec`, `end-sec`,
//! `end-usec`, `duration-usec` (all 32-bit hex), followed by a count and an
//! ordered list of per-resource reports, each with a type-tag string, a key
//! string, an action count, and action tuples (description, outcome).

use concord_pack::{PackError, Packer, Unpacker};

use crate::error::{ApiError, Result};
use crate::kind::Kind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    Fail,
    Skip,
    Fixed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Ok => "ok",
            Outcome::Fail => "fail",
            Outcome::Skip => "skip",
            Outcome::Fixed => "fixed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "ok" => Outcome::Ok,
            "fail" => Outcome::Fail,
            "skip" => Outcome::Skip,
            "fixed" => Outcome::Fixed,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub description: String,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceReport {
    pub type_tag: String,
    pub key: String,
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub start_sec: u32,
    pub start_usec: u32,
    pub end_sec: u32,
    pub end_usec: u32,
    pub resources: Vec<ResourceReport>,
}

impl JobReport {
    pub fn duration_usec(&self) -> u32 {
        let start = (self.start_sec as u64) * 1_000_000 + self.start_usec as u64;
        let end = (self.end_sec as u64) * 1_000_000 + self.end_usec as u64;
        end.saturating_sub(start) as u32
    }

    pub fn pack(&self) -> String {
        let mut p = Packer::new()
            .u32(self.start_sec)
            .u32(self.start_usec)
            .u32(self.end_sec)
            .u32(self.end_usec)
            .u32(self.duration_usec())
            .u32(self.resources.len() as u32);
        for r in &self.resources {
            p = p
                .str(&r.type_tag)
                .str(&r.key)
                .u32(r.actions.len() as u32);
            for a in &r.actions {
                p = p.str(&a.description).str(a.outcome.as_str());
            }
        }
        p.finish()
    }

    pub fn unpack(packed: &str) -> Result<Self> {
        let mut u = Unpacker::new(packed);
        let from_pack = |e: PackError| ApiError::new(Kind::ParseError, e.to_string());

        let start_sec = u.u32().map_err(from_pack)?;
        let start_usec = u.u32().map_err(from_pack)?;
        let end_sec = u.u32().map_err(from_pack)?;
        let end_usec = u.u32().map_err(from_pack)?;
        let _duration_usec = u.u32().map_err(from_pack)?;
        let count = u.u32().map_err(from_pack)?;

        let mut resources = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let type_tag = u.str().map_err(from_pack)?;
            let key = u.str().map_err(from_pack)?;
            let action_count = u.u32().map_err(from_pack)?;
            let mut actions = Vec::with_capacity(action_count as usize);
            for _ in 0..action_count {
                let description = u.str().map_err(from_pack)?;
                let outcome_tag = u.str().map_err(from_pack)?;
                let outcome = Outcome::parse(&outcome_tag).ok_or_else(|| {
                    ApiError::new(Kind::ParseError, format!("unknown outcome tag '{outcome_tag}'"))
                })?;
                actions.push(Action { description, outcome });
            }
            resources.push(ResourceReport { type_tag, key, actions });
        }

        Ok(JobReport {
            start_sec,
            start_usec,
            end_sec,
            end_usec,
            resources,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> JobReport {
        JobReport {
            start_sec: 1_700_000_000,
            start_usec: 0,
            end_sec: 1_700_000_002,
            end_usec: 500_000,
            resources: vec![ResourceReport {
                type_tag: "res_user".to_string(),
                key: "bourbon".to_string(),
                actions: vec![
                    Action { description: "set uid to 101".to_string(), outcome: Outcome::Fixed },
                    Action { description: "password already correct".to_string(), outcome: Outcome::Ok },
                ],
            }],
        }
    }

    #[test]
    fn duration_is_computed_from_start_and_end() {
        let r = sample();
        assert_eq!(r.duration_usec(), 2_500_000);
    }

    #[test]
    fn pack_roundtrips() {
        let r = sample();
        let packed = r.pack();
        let back = JobReport::unpack(&packed).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn empty_report_roundtrips() {
        let r = JobReport {
            start_sec: 0,
            start_usec: 0,
            end_sec: 0,
            end_usec: 0,
            resources: vec![],
        };
        let back = JobReport::unpack(&r.pack()).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn unknown_outcome_tag_is_rejected() {
        let packed = Packer::new()
            .u32(0)
            .u32(0)
            .u32(0)
            .u32(0)
            .u32(0)
            .u32(1)
            .str("res_user")
            .str("bourbon")
            .u32(1)
            .str("did something")
            .str("maybe")
            .finish();
        assert!(JobReport::unpack(&packed).is_err());
    }
}
