//! The exposure triad: ISO, aperture (Av), shutter speed (Tv).
//!
//! Each setting is an index into an ordered table of human-readable labels
//! paired one to one with the EDSDK property codes. Stepping saturates at the
//! table edges, and only a step that actually moves the index produces a
//! property write, so the camera never sees a redundant update at the
//! boundary.

use crate::edsdk::{PROP_AV, PROP_ISO_SPEED, PROP_TV};

/// One ordered label/code scale plus the property it drives.
pub struct ExposureScale {
    pub labels: &'static [&'static str],
    pub codes: &'static [u32],
    pub prop: u32,
}

impl ExposureScale {
    /// Index of `code` in the scale, if listed.
    #[must_use]
    pub fn index_of(&self, code: u32) -> Option<usize> {
        self.codes.iter().position(|&c| c == code)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Full-stop ISO scale for the Rebel XSi.
pub static ISO_SCALE: ExposureScale = ExposureScale {
    labels: &["Auto", "100", "200", "400", "800", "1600"],
    codes: &[0x00, 0x48, 0x50, 0x58, 0x60, 0x68],
    prop: PROP_ISO_SPEED,
};

/// Third-stop aperture scale covering the kit lens range.
pub static AV_SCALE: ExposureScale = ExposureScale {
    labels: &[
        "3.5", "4.0", "4.5", "5.0", "5.6", "6.3", "7.1", "8.0", "9.0", "10", "11", "13", "14",
        "16", "18", "20", "22",
    ],
    codes: &[
        0x25, 0x28, 0x2B, 0x2D, 0x30, 0x33, 0x35, 0x38, 0x3B, 0x3D, 0x40, 0x43, 0x45, 0x48, 0x4B,
        0x4D, 0x50,
    ],
    prop: PROP_AV,
};

/// Full-stop shutter scale, 30s down to 1/4000.
pub static TV_SCALE: ExposureScale = ExposureScale {
    labels: &[
        "30\"", "15\"", "8\"", "4\"", "2\"", "1\"", "0\"5", "1/4", "1/8", "1/15", "1/30", "1/60",
        "1/125", "1/250", "1/500", "1/1000", "1/2000", "1/4000",
    ],
    codes: &[
        0x10, 0x18, 0x20, 0x28, 0x30, 0x38, 0x40, 0x48, 0x50, 0x58, 0x60, 0x68, 0x70, 0x78, 0x80,
        0x88, 0x90, 0x98,
    ],
    prop: PROP_TV,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExposureParam {
    Iso,
    Av,
    Tv,
}

impl ExposureParam {
    #[must_use]
    pub fn scale(self) -> &'static ExposureScale {
        match self {
            ExposureParam::Iso => &ISO_SCALE,
            ExposureParam::Av => &AV_SCALE,
            ExposureParam::Tv => &TV_SCALE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Down,
    Up,
}

/// Current index into each scale. Invariant: always within the table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExposureState {
    pub iso: usize,
    pub av: usize,
    pub tv: usize,
}

impl ExposureState {
    /// Seed the state from property values read off the camera. A code the
    /// table does not list falls back to index 0; the caller decides whether
    /// to warn.
    #[must_use]
    pub fn from_codes(iso: u32, av: u32, tv: u32) -> Self {
        Self {
            iso: ISO_SCALE.index_of(iso).unwrap_or(0),
            av: AV_SCALE.index_of(av).unwrap_or(0),
            tv: TV_SCALE.index_of(tv).unwrap_or(0),
        }
    }

    fn index_mut(&mut self, param: ExposureParam) -> &mut usize {
        match param {
            ExposureParam::Iso => &mut self.iso,
            ExposureParam::Av => &mut self.av,
            ExposureParam::Tv => &mut self.tv,
        }
    }

    #[must_use]
    pub fn index(&self, param: ExposureParam) -> usize {
        match param {
            ExposureParam::Iso => self.iso,
            ExposureParam::Av => self.av,
            ExposureParam::Tv => self.tv,
        }
    }

    /// Current label for `param`.
    #[must_use]
    pub fn label(&self, param: ExposureParam) -> &'static str {
        param.scale().labels[self.index(param)]
    }

    /// Step one setting by one position, saturating at the ends.
    ///
    /// Returns `Some((property, code))` for the write the session must issue,
    /// or `None` when the index was already at the boundary and nothing
    /// changed.
    pub fn adjust(&mut self, param: ExposureParam, direction: Direction) -> Option<(u32, u32)> {
        let scale = param.scale();
        let index = self.index_mut(param);
        let next = match direction {
            Direction::Down => index.checked_sub(1)?,
            Direction::Up => {
                if *index + 1 >= scale.len() {
                    return None;
                }
                *index + 1
            }
        };
        *index = next;
        Some((scale.prop, scale.codes[next]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_are_paired() {
        for scale in [&ISO_SCALE, &AV_SCALE, &TV_SCALE] {
            assert_eq!(scale.labels.len(), scale.codes.len());
            assert!(!scale.is_empty());
        }
    }

    #[test]
    fn test_decrement_at_zero_is_a_no_op() {
        let mut state = ExposureState::default();
        assert_eq!(state.adjust(ExposureParam::Iso, Direction::Down), None);
        assert_eq!(state.iso, 0);
    }

    #[test]
    fn test_increment_at_top_is_a_no_op() {
        let mut state = ExposureState {
            tv: TV_SCALE.len() - 1,
            ..ExposureState::default()
        };
        assert_eq!(state.adjust(ExposureParam::Tv, Direction::Up), None);
        assert_eq!(state.tv, TV_SCALE.len() - 1);
    }

    #[test]
    fn test_in_range_step_moves_one_and_reports_new_code() {
        let mut state = ExposureState {
            iso: 2,
            ..ExposureState::default()
        };
        let update = state.adjust(ExposureParam::Iso, Direction::Up);
        assert_eq!(state.iso, 3);
        assert_eq!(update, Some((PROP_ISO_SPEED, ISO_SCALE.codes[3])));

        let update = state.adjust(ExposureParam::Iso, Direction::Down);
        assert_eq!(state.iso, 2);
        assert_eq!(update, Some((PROP_ISO_SPEED, ISO_SCALE.codes[2])));
    }

    #[test]
    fn test_parameters_are_independent() {
        let mut state = ExposureState::default();
        state.adjust(ExposureParam::Av, Direction::Up);
        assert_eq!(state.av, 1);
        assert_eq!(state.iso, 0);
        assert_eq!(state.tv, 0);
    }

    #[test]
    fn test_from_codes_resolves_known_values() {
        let state = ExposureState::from_codes(0x58, 0x30, 0x60);
        assert_eq!(state.label(ExposureParam::Iso), "400");
        assert_eq!(state.label(ExposureParam::Av), "5.6");
        assert_eq!(state.label(ExposureParam::Tv), "1/30");
    }

    #[test]
    fn test_from_codes_unknown_falls_back_to_zero() {
        let state = ExposureState::from_codes(0xFF, 0xFF, 0xFF);
        assert_eq!(state, ExposureState::default());
    }
}
