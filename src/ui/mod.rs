pub mod metronome;
pub mod theme;

pub use metronome::{render_footer, render_pads, render_transport};
pub use theme::Theme;
