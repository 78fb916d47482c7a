//! Depth limits for loads and saves

/// Maximum path depth of a load (50)
pub const MAX_LOAD_DEPTH: u32 = 50;

/// Maximum relationship depth of a save (50)
pub const MAX_SAVE_DEPTH: u32 = 50;

/// Limit violation
#[derive(Debug, Clone, PartialEq)]
pub enum LimitError {
    LoadDepthTooLarge { depth: u32, max: u32 },
    SaveDepthTooLarge { depth: u32, max: u32 },
}

impl std::fmt::Display for LimitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LoadDepthTooLarge { depth, max } => {
                write!(f, "Load depth too large: {} (max {})", depth, max)
            }
            Self::SaveDepthTooLarge { depth, max } => {
                write!(f, "Save depth too large: {} (max {})", depth, max)
            }
        }
    }
}

impl std::error::Error for LimitError {}

/// Validate load depth
pub fn validate_load_depth(depth: u32) -> Result<(), LimitError> {
    if depth > MAX_LOAD_DEPTH {
        return Err(LimitError::LoadDepthTooLarge {
            depth,
            max: MAX_LOAD_DEPTH,
        });
    }
    Ok(())
}

/// Validate save depth
pub fn validate_save_depth(depth: u32) -> Result<(), LimitError> {
    if depth > MAX_SAVE_DEPTH {
        return Err(LimitError::SaveDepthTooLarge {
            depth,
            max: MAX_SAVE_DEPTH,
        });
    }
    Ok(())
}
