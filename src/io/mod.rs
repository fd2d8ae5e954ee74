//! I/O modules for reading microscope stacks and images and writing results

pub mod reader;
pub mod writer;

pub use reader::{ImageReader, load_single, load_stack};
pub use writer::{normalize_for_display, save_png, to_gray8};
