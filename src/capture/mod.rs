// Capture side of the bridge: the media stack seam and its in-process stand-ins.
pub mod buffer;
pub mod camera;
pub mod loopback;
pub mod media;
