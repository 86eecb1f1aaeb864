use crate::error::{ConfigurationIssue, ContextResult};
use bytemuck::{Pod, Zeroable};
use serde::Deserialize;

/// Edge length of the square screen tile that maps to one contiguous reservoir run.
pub const RESERVOIR_BLOCK_SIZE: u32 = 16;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Deserialize)]
pub enum CheckerboardMode {
    #[default]
    Off,
    Black,
    White,
}

impl CheckerboardMode {
    pub fn is_enabled(self) -> bool {
        self != CheckerboardMode::Off
    }

    /// Field shaded on `frame_index`: 0 = all pixels, otherwise checkerboard field 1 or 2.
    pub fn active_field(self, frame_index: u32) -> u32 {
        let odd = frame_index & 1 != 0;
        match self {
            CheckerboardMode::Off => 0,
            CheckerboardMode::Black => {
                if odd {
                    1
                } else {
                    2
                }
            }
            CheckerboardMode::White => {
                if odd {
                    2
                } else {
                    1
                }
            }
        }
    }
}

/// Block-linear pitches of a reservoir buffer, in reservoir elements.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct ReservoirBufferParameters {
    pub block_row_pitch: u32,
    pub array_pitch: u32,
    _pad: [u32; 2],
}

impl ReservoirBufferParameters {
    /// Number of elements for `buffer_count` ping-ponged reservoir arrays.
    pub fn element_count(&self, buffer_count: u32) -> ContextResult<u32> {
        self.array_pitch
            .checked_mul(buffer_count)
            .ok_or_else(|| ConfigurationIssue::SizeOverflow("reservoir buffer").into())
    }

    /// Element index of `pixel` inside reservoir array `array_index`.
    pub fn reservoir_index(&self, pixel: [u32; 2], array_index: u32) -> u32 {
        let block = [pixel[0] / RESERVOIR_BLOCK_SIZE, pixel[1] / RESERVOIR_BLOCK_SIZE];
        let in_block = [pixel[0] % RESERVOIR_BLOCK_SIZE, pixel[1] % RESERVOIR_BLOCK_SIZE];
        array_index * self.array_pitch
            + block[1] * self.block_row_pitch
            + block[0] * (RESERVOIR_BLOCK_SIZE * RESERVOIR_BLOCK_SIZE)
            + in_block[1] * RESERVOIR_BLOCK_SIZE
            + in_block[0]
    }
}

pub fn calculate_reservoir_buffer_parameters(
    render_width: u32,
    render_height: u32,
    checkerboard_mode: CheckerboardMode,
) -> ContextResult<ReservoirBufferParameters> {
    let effective_width = if checkerboard_mode.is_enabled() {
        render_width.div_ceil(2)
    } else {
        render_width
    };
    let width_blocks = effective_width.div_ceil(RESERVOIR_BLOCK_SIZE);
    let height_blocks = render_height.div_ceil(RESERVOIR_BLOCK_SIZE);
    let overflow = || ConfigurationIssue::SizeOverflow("reservoir buffer");
    let block_row_pitch = width_blocks
        .checked_mul(RESERVOIR_BLOCK_SIZE * RESERVOIR_BLOCK_SIZE)
        .ok_or_else(overflow)?;
    let array_pitch = block_row_pitch
        .checked_mul(height_blocks)
        .ok_or_else(overflow)?;

    Ok(ReservoirBufferParameters {
        block_row_pitch,
        array_pitch,
        _pad: [0; 2],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK_AREA: u32 = RESERVOIR_BLOCK_SIZE * RESERVOIR_BLOCK_SIZE;

    #[test]
    fn full_hd_without_checkerboard() {
        let p = calculate_reservoir_buffer_parameters(1920, 1080, CheckerboardMode::Off).unwrap();
        assert_eq!(p.block_row_pitch % BLOCK_AREA, 0);
        // 1080 / 16 = 67.5 -> 68 block rows
        assert_eq!(p.array_pitch, p.block_row_pitch * 68);
        assert_eq!(p.block_row_pitch, 120 * BLOCK_AREA);
    }

    #[test]
    fn checkerboard_halves_width_rounding_up() {
        let p = calculate_reservoir_buffer_parameters(33, 16, CheckerboardMode::Black).unwrap();
        // ceil(33 / 2) = 17 -> 2 blocks
        assert_eq!(p.block_row_pitch, 2 * BLOCK_AREA);
        assert_eq!(p.array_pitch, p.block_row_pitch);
    }

    #[test]
    fn partial_edge_tiles_get_a_full_block() {
        let p = calculate_reservoir_buffer_parameters(1, 1, CheckerboardMode::Off).unwrap();
        assert_eq!(p.block_row_pitch, BLOCK_AREA);
        assert_eq!(p.array_pitch, BLOCK_AREA);
    }

    #[test]
    fn tile_pixels_are_contiguous() {
        let p = calculate_reservoir_buffer_parameters(64, 64, CheckerboardMode::Off).unwrap();
        let first = p.reservoir_index([16, 32], 0);
        let last = p.reservoir_index([31, 47], 0);
        assert_eq!(last - first, BLOCK_AREA - 1);
        assert_eq!(p.reservoir_index([0, 0], 2), 2 * p.array_pitch);
    }

    #[test]
    fn oversized_render_is_rejected() {
        let err = calculate_reservoir_buffer_parameters(65536, 65536, CheckerboardMode::Off)
            .unwrap_err();
        assert!(err.is_invalid_configuration());
        // Checkerboard halves the width, which brings the pitch back in range.
        let p = calculate_reservoir_buffer_parameters(65536, 65536, CheckerboardMode::Black)
            .unwrap();
        assert_eq!(p.array_pitch, 1 << 31);
        assert!(p.element_count(3).is_err());
        assert_eq!(p.element_count(1).unwrap(), 1 << 31);
    }

    #[test]
    fn active_field_alternates() {
        assert_eq!(CheckerboardMode::Off.active_field(3), 0);
        assert_eq!(CheckerboardMode::Black.active_field(1), 1);
        assert_eq!(CheckerboardMode::Black.active_field(2), 2);
        assert_eq!(CheckerboardMode::White.active_field(1), 2);
        assert_eq!(CheckerboardMode::White.active_field(2), 1);
    }
}
