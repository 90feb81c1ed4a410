// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Built-in control plugins.

use std::sync::Arc;

use crate::plugin::ControlPlugin;

mod color;
mod number;
mod scalar;
mod select;
mod vector;

pub use color::ColorPlugin;
pub use number::NumberPlugin;
pub use scalar::{BooleanPlugin, ImagePlugin, StringPlugin};
pub use select::{SelectPlugin, labelled_options};
pub use vector::{IntervalPlugin, VectorPlugin};

/// The built-in plugins in inference order.
pub(crate) fn all() -> Vec<Arc<dyn ControlPlugin>> {
    vec![
        Arc::new(SelectPlugin),
        Arc::new(ImagePlugin),
        Arc::new(NumberPlugin),
        Arc::new(ColorPlugin),
        Arc::new(StringPlugin),
        Arc::new(BooleanPlugin),
        Arc::new(IntervalPlugin),
        Arc::new(VectorPlugin::VECTOR3D),
        Arc::new(VectorPlugin::VECTOR2D),
    ]
}
