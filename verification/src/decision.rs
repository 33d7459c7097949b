//! The overall accept/reject decision.

/// Face step result as seen by the decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaceOutcome {
    pub strict: bool,
    pub successes: u32,
    pub required: u32,
}

impl FaceOutcome {
    pub fn passed(&self) -> bool {
        self.successes >= self.required
    }
}

/// Location step result as seen by the decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GeoOutcome {
    pub strict: bool,
    pub within_radius: bool,
}

/// An absent step passes; a present step passes when it succeeded or is not
/// strict.
pub fn overall_match(face: Option<&FaceOutcome>, geo: Option<&GeoOutcome>) -> bool {
    let face_ok = face.map_or(true, |f| f.passed() || !f.strict);
    let geo_ok = geo.map_or(true, |g| g.within_radius || !g.strict);
    face_ok && geo_ok
}
