mod clkbufmap;

pub use clkbufmap::{BufferSpec, ClkbufmapError, ClkbufmapOptions, ClkbufmapStats, GeneratedClockRule, clkbufmap};
