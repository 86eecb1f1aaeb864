use std::cell::OnceCell;

// Additive-recurrence constants from the plastic number.
// http://extremelearning.com.au/unreasonable-effectiveness-of-quasirandom-sequences/
const PLASTIC: f32 = 1.324_717_957_244_7;
const INV_PHI2: f32 = 1.0 / PLASTIC;

/// Diameter of the disk in offset units; samples land in [-125, 125].
const OFFSET_SCALE: f32 = 250.0;

/// Fill `2 * count` bytes with (x, y) pairs of a low-discrepancy disk sample set.
///
/// Points outside the inscribed disk of the unit square are rejected, so the
/// sequence stays disk shaped. The output depends on `count` only.
pub fn generate_neighbor_offsets(count: u32) -> Vec<i8> {
    let target = count as usize * 2;
    let mut out = Vec::with_capacity(target);
    let mut u = 0.5f32;
    let mut v = 0.5f32;

    while out.len() < target {
        u += INV_PHI2;
        v += INV_PHI2 * INV_PHI2;
        if u >= 1.0 {
            u -= 1.0;
        }
        if v >= 1.0 {
            v -= 1.0;
        }

        let r_sq = (u - 0.5) * (u - 0.5) + (v - 0.5) * (v - 0.5);
        if r_sq > 0.25 {
            continue;
        }

        out.push(((u - 0.5) * OFFSET_SCALE) as i8);
        out.push(((v - 0.5) * OFFSET_SCALE) as i8);
    }

    out
}

/// Lazily generated neighbor-offset table owned by a resampling context.
///
/// `offsets()` may be called every frame; the table is built on the first call only.
#[derive(Debug)]
pub struct NeighborOffsetTable {
    count: u32,
    offsets: OnceCell<Vec<i8>>,
}

impl NeighborOffsetTable {
    pub fn new(count: u32) -> Self {
        Self {
            count,
            offsets: OnceCell::new(),
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn is_initialized(&self) -> bool {
        self.offsets.get().is_some()
    }

    pub fn offsets(&self) -> &[i8] {
        self.offsets.get_or_init(|| {
            log::debug!("generating {} neighbor offsets", self.count);
            generate_neighbor_offsets(self.count)
        })
    }

    /// Raw bytes for an RG8_SNORM buffer upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.offsets())
    }

    pub fn pairs(&self) -> impl Iterator<Item = [i8; 2]> + '_ {
        self.offsets().chunks_exact(2).map(|p| [p[0], p[1]])
    }
}
