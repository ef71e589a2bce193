// CONTROLLER: Pointer input and camera orbiting
pub mod input;
pub mod orbit_controls;

pub use input::{InputEvent, Modifiers, MouseButton};
pub use orbit_controls::{DragState, OrbitControls, Spherical};
