use enigo::{Button, Coordinate, Direction, Enigo, Mouse, Settings};

use crate::ClickError;

/// Cursor and mouse button access
pub trait Pointer {
    fn location(&self) -> Result<(i32, i32), ClickError>;

    /// Size of the main display in pixels
    fn display_size(&self) -> Result<(i32, i32), ClickError>;

    fn move_to(&mut self, x: i32, y: i32) -> Result<(), ClickError>;

    fn click_primary(&mut self) -> Result<(), ClickError>;
}

/// Synthetic input through enigo
pub struct EnigoPointer {
    enigo: Enigo,
}

impl EnigoPointer {
    pub fn new() -> Result<Self, ClickError> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| ClickError::Backend(format!("Failed to connect to input backend: {e}")))?;
        Ok(Self { enigo })
    }
}

impl Pointer for EnigoPointer {
    fn location(&self) -> Result<(i32, i32), ClickError> {
        self.enigo
            .location()
            .map_err(|e| ClickError::Backend(format!("Failed to read cursor position: {e}")))
    }

    fn display_size(&self) -> Result<(i32, i32), ClickError> {
        self.enigo
            .main_display()
            .map_err(|e| ClickError::Backend(format!("Failed to read display size: {e}")))
    }

    fn move_to(&mut self, x: i32, y: i32) -> Result<(), ClickError> {
        self.enigo
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(|e| ClickError::Backend(format!("Failed to move cursor: {e}")))
    }

    fn click_primary(&mut self) -> Result<(), ClickError> {
        self.enigo
            .button(Button::Left, Direction::Click)
            .map_err(|e| ClickError::Backend(format!("Failed to click: {e}")))
    }
}
