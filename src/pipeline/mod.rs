//! Pipeline stages, in execution order:
//!
//! 1. [`extract`] — decode the source document into text, markup, images,
//!    and tables; sniff image dimensions ([`dimensions`]) and describe each
//!    image via the vision model ([`vision`]).
//! 2. [`plan`] — ask the text model for a JSON formatting plan, parse it
//!    defensively ([`json`]), and repair it for image completeness.
//! 3. [`assemble`] — deterministically turn the plan plus the extracted
//!    records into the output document tree.
//!
//! [`retry`] wraps both remote-model call sites. Everything here is
//! side-effect free apart from the model calls behind the provider traits.

pub mod assemble;
pub mod dimensions;
pub mod extract;
pub mod json;
pub mod plan;
pub mod retry;
pub mod vision;
