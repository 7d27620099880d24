//! The units used by drawings.
//!
//! Presentation drawings measure everything in _English Metric Units_ (EMU).
//! There are 914400 EMU to an inch, which makes both inches and centimetres
//! integral.

use crate::transform::Transform;

pub const EMU_PER_CM: f64 = 360_000.;


/// Converts a length in EMU into centimetres.
pub fn cm(emu: f64) -> f64 {
    emu / EMU_PER_CM
}

/// The transform from drawing units into the flat map space.
///
/// This is the root of every shape's transform stack. Flat map space
/// measures in centimetres with the y axis pointing down.
pub fn emu_to_cm() -> Transform {
    Transform::scale(1. / EMU_PER_CM, 1. / EMU_PER_CM)
}
