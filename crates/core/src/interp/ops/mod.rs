//! Content stream operator implementations.
//!
//! Operators are grouped by category:
//! - `graphics_state` - State stack and parameters (q, Q, cm, w, J, j, M, d, gs)
//! - `color` - Color spaces and values (G, g, RG, rg, K, k, CS, cs, SC, SCN, sc, scn)
//! - `path` - Path construction, painting and clipping (m, l, c, v, y, h, re, S, s, f, F, f\*, B, B\*, b, b\*, n, W, W\*, sh)
//! - `text` - Text objects and text state (BT, ET, Tc, Tw, Tz, TL, Tf, Tr, Ts, Td, TD, Tm, T\*, Tj, TJ, ', ")
//! - `xobject` - XObjects and inline images (Do, BI, ID, EI)
//!
//! Each module adds an `impl` block to [`ContentInterpreter`](super::ContentInterpreter).

mod color;
mod graphics_state;
mod path;
mod text;
mod xobject;

pub use color::parse_color_space;
