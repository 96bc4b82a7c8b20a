//! RT-safe DSP building blocks. Nothing here allocates after construction.

mod biquad;
pub use biquad::{Biquad, BUTTERWORTH_Q};

mod one_pole;
pub use one_pole::OnePole;

mod window;
pub use window::{WindowShape, WindowTable, MAX_WINDOW_LEN};

mod gain;
pub use gain::{constant_power_pan, equal_power_gains, soft_clip};
