//! Concentric spherical ("onion") partition of the space around the ReGIR center.
//!
//! The sphere is split into layer groups of increasing angular detail. Each group
//! is a stack of shells whose thickness grows geometrically, and every shell is cut
//! into rings of constant elevation that are in turn cut into cells of roughly
//! equal solid angle. Cells further out are bigger, which matches the falloff of
//! lighting detail with distance from the camera.

use crate::error::{ConfigurationIssue, ContextResult};
use crate::geometry::spherical::{distance, mean, median, spherical_to_cartesian};
use bytemuck::{Pod, Zeroable};
use std::f32::consts::{PI, TAU};

/// Capacity of the layer-group array in the shader constant block.
pub const MAX_ONION_LAYER_GROUPS: usize = 8;
/// Capacity of the ring array in the shader constant block.
pub const MAX_ONION_RINGS: usize = 52;

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct OnionLayerGroup {
    pub inner_radius: f32,
    pub outer_radius: f32,
    pub inv_log_layer_scale: f32,
    pub layer_count: u32,
    pub inv_equatorial_cell_angle: f32,
    pub cells_per_layer: u32,
    pub ring_offset: u32,
    pub ring_count: u32,
    pub equatorial_cell_angle: f32,
    pub layer_scale: f32,
    pub layer_cell_offset: u32,
    _pad: u32,
}

impl OnionLayerGroup {
    fn ring_range(&self) -> std::ops::Range<usize> {
        self.ring_offset as usize..(self.ring_offset + self.ring_count) as usize
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct OnionRing {
    pub cell_angle: f32,
    pub inv_cell_angle: f32,
    pub cell_offset: u32,
    pub cell_count: u32,
}

impl OnionRing {
    fn new(cell_count: u32, cell_offset: u32) -> Self {
        Self {
            cell_angle: TAU / cell_count as f32,
            inv_cell_angle: cell_count as f32 / TAU,
            cell_offset,
            cell_count,
        }
    }
}

/// Packed onion layout as the ReGIR shaders read it.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct ReGirOnionParameters {
    pub layers: [OnionLayerGroup; MAX_ONION_LAYER_GROUPS],
    pub rings: [OnionRing; MAX_ONION_RINGS],
    pub num_layer_groups: u32,
    pub cubic_root_factor: f32,
    pub linear_factor: f32,
    _pad: f32,
}

/// Result of [`build_onion`]: the partition plus the two jitter-curve factors.
#[derive(Debug, Clone, PartialEq)]
pub struct OnionGrid {
    pub layer_groups: Vec<OnionLayerGroup>,
    pub rings: Vec<OnionRing>,
    /// Jitter radius per cube root of distance, for the inner (bounded) groups.
    pub cubic_root_factor: f32,
    /// Jitter radius per unit distance, for the outer (unbounded) group.
    pub linear_factor: f32,
    total_cells: u32,
}

/// Build the onion partition for `detail_layers` layer groups, the last one
/// extended by `coverage_layers` extra shells.
///
/// `detail_layers` is clamped to `1..=MAX_ONION_LAYER_GROUPS`.
pub fn build_onion(detail_layers: u32, coverage_layers: u32) -> OnionGrid {
    let num_layer_groups = detail_layers.clamp(1, MAX_ONION_LAYER_GROUPS as u32);
    if num_layer_groups != detail_layers {
        log::debug!(
            "onion detail layers {} clamped to {}",
            detail_layers,
            num_layer_groups
        );
    }

    let mut layer_groups: Vec<OnionLayerGroup> = Vec::with_capacity(num_layer_groups as usize);
    let mut rings: Vec<OnionRing> = Vec::new();
    let mut inner_radius = 1.0f32;
    // Slot 0 is the cell around the center point itself.
    let mut total_cells = 1u32;

    for group_index in 0..num_layer_groups {
        let partitions = group_index * 4 + 8;
        // Only the outermost group gets the coverage shells, and always at least one.
        let layer_count = if group_index + 1 < num_layer_groups {
            1
        } else {
            coverage_layers.saturating_add(1)
        };

        let p = partitions as f32;
        let radius_ratio = (p + PI) / (p - PI);
        let outer_radius = inner_radius * radius_ratio.powf(layer_count as f32);
        let equatorial_angle = TAU / p;

        let ring_offset = rings.len() as u32;
        let cells_per_layer = push_rings(&mut rings, partitions, equatorial_angle);

        layer_groups.push(OnionLayerGroup {
            inner_radius,
            outer_radius,
            inv_log_layer_scale: 1.0 / radius_ratio.ln(),
            layer_count,
            inv_equatorial_cell_angle: 1.0 / equatorial_angle,
            cells_per_layer,
            ring_offset,
            ring_count: rings.len() as u32 - ring_offset,
            equatorial_cell_angle: equatorial_angle,
            layer_scale: radius_ratio,
            layer_cell_offset: total_cells,
            _pad: 0,
        });

        total_cells = total_cells.saturating_add(cells_per_layer.saturating_mul(layer_count));
        inner_radius = outer_radius;
    }

    let (cubic_root_factor, linear_factor) = compute_jitter_curve(&layer_groups, &rings);

    log::debug!(
        "built onion: {} layer groups, {} rings, {} cells, jitter factors {:.4}/{:.4}",
        layer_groups.len(),
        rings.len(),
        total_cells,
        cubic_root_factor,
        linear_factor
    );

    OnionGrid {
        layer_groups,
        rings,
        cubic_root_factor,
        linear_factor,
        total_cells,
    }
}

/// Append the rings of one layer group, equator first, and return the cells per layer.
fn push_rings(rings: &mut Vec<OnionRing>, partitions: u32, equatorial_angle: f32) -> u32 {
    rings.push(OnionRing::new(partitions, 0));
    let mut cells_per_layer = partitions;

    for ring_index in 1..=partitions / 4 {
        let elevation = equatorial_angle * ring_index as f32;
        // cos() is ~0 (or slightly negative) at the pole ring.
        let cell_count = ((partitions as f32 * elevation.cos()).floor() as i64).max(1) as u32;
        rings.push(OnionRing::new(cell_count, cells_per_layer));
        // Northern and southern copies of the ring share one entry.
        cells_per_layer += cell_count * 2;
    }

    cells_per_layer
}

/// Fit the two jitter-curve factors over every shell of the grid.
///
/// Inner groups are normalized by the cube root of the shell's middle radius and
/// reduced with a median, since pole rings produce outliers. The outer group grows
/// linearly and is reduced with a mean.
fn compute_jitter_curve(layer_groups: &[OnionLayerGroup], rings: &[OnionRing]) -> (f32, f32) {
    let (mut cubic_root_samples, linear_samples) = jitter_samples(layer_groups, rings);
    let cubic_root_factor = median(&mut cubic_root_samples).unwrap_or(0.0);
    (cubic_root_factor, mean(&linear_samples))
}

/// Per-shell jitter samples: cube-root normalized for inner groups, linear for the last one.
fn jitter_samples(layer_groups: &[OnionLayerGroup], rings: &[OnionRing]) -> (Vec<f32>, Vec<f32>) {
    let mut cubic_root_samples: Vec<f32> = Vec::new();
    let mut linear_samples: Vec<f32> = Vec::new();
    let last_group = layer_groups.len().saturating_sub(1);

    for (group_index, group) in layer_groups.iter().enumerate() {
        let group_rings = &rings[group.ring_range()];

        for layer_index in 0..group.layer_count {
            let inner_radius = group.inner_radius * group.layer_scale.powf(layer_index as f32);
            let outer_radius = inner_radius * group.layer_scale;
            let middle_radius = (inner_radius + outer_radius) * 0.5;

            let max_cell_radius = group_rings
                .iter()
                .enumerate()
                .map(|(ring_index, ring)| {
                    cell_radius(group, ring_index, ring, middle_radius, outer_radius)
                })
                .fold(0.0f32, f32::max);

            if group_index < last_group {
                cubic_root_samples.push(max_cell_radius / middle_radius.cbrt());
            } else {
                linear_samples.push(max_cell_radius / middle_radius);
            }
        }
    }

    (cubic_root_samples, linear_samples)
}

/// Distance from the center of a cell in `ring` to its farthest corner.
fn cell_radius(
    group: &OnionLayerGroup,
    ring_index: usize,
    ring: &OnionRing,
    middle_radius: f32,
    outer_radius: f32,
) -> f32 {
    let half_angle = group.equatorial_cell_angle * 0.5;
    let middle_elevation = group.equatorial_cell_angle * ring_index as f32;
    // The equator ring straddles elevation 0; other rings are widest on their equator side.
    let vertex_elevation = if ring_index == 0 {
        half_angle
    } else {
        middle_elevation - half_angle
    };

    let middle = spherical_to_cartesian(ring.cell_angle * 0.5, middle_elevation, middle_radius);
    let vertex = spherical_to_cartesian(0.0, vertex_elevation, outer_radius);
    distance(middle, vertex)
}

impl OnionGrid {
    /// Number of cells including the center cell.
    pub fn total_cells(&self) -> u32 {
        self.total_cells
    }

    pub fn layer_group_count(&self) -> usize {
        self.layer_groups.len()
    }

    pub fn ring_count(&self) -> usize {
        self.rings.len()
    }

    /// Radius beyond which only the outer group's shells remain.
    pub fn detail_radius(&self) -> f32 {
        match self.layer_groups.len() {
            0 | 1 => 1.0,
            n => self.layer_groups[n - 2].outer_radius,
        }
    }

    /// Flat slot index of one cell, or `None` if any coordinate is out of range.
    ///
    /// `southern` selects the mirrored copy of a non-equatorial ring.
    pub fn cell_slot(
        &self,
        group: usize,
        layer: u32,
        ring: usize,
        cell: u32,
        southern: bool,
    ) -> Option<u32> {
        let g = self.layer_groups.get(group)?;
        if layer >= g.layer_count || ring >= g.ring_count as usize {
            return None;
        }
        let r = self.rings[g.ring_offset as usize + ring];
        if cell >= r.cell_count {
            return None;
        }
        let hemisphere = if southern && ring > 0 { r.cell_count } else { 0 };
        Some(g.layer_cell_offset + layer * g.cells_per_layer + r.cell_offset + hemisphere + cell)
    }

    /// Pack into the fixed-capacity shader layout.
    pub fn to_gpu(&self) -> ContextResult<ReGirOnionParameters> {
        if self.layer_groups.len() > MAX_ONION_LAYER_GROUPS || self.rings.len() > MAX_ONION_RINGS
        {
            return Err(ConfigurationIssue::OnionCapacityExceeded {
                layer_groups: self.layer_groups.len(),
                rings: self.rings.len(),
                max_layer_groups: MAX_ONION_LAYER_GROUPS,
                max_rings: MAX_ONION_RINGS,
            }
            .into());
        }

        let mut params = ReGirOnionParameters::zeroed();
        params.layers[..self.layer_groups.len()].copy_from_slice(&self.layer_groups);
        params.rings[..self.rings.len()].copy_from_slice(&self.rings);
        params.num_layer_groups = self.layer_groups.len() as u32;
        params.cubic_root_factor = self.cubic_root_factor;
        params.linear_factor = self.linear_factor;
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn detail_layers_are_clamped() {
        assert_eq!(build_onion(0, 0), build_onion(1, 0));
        assert_eq!(build_onion(20, 3).layer_group_count(), MAX_ONION_LAYER_GROUPS);
    }

    #[test]
    fn capacity_holds_over_exposed_range() {
        for detail in 0..=8 {
            for coverage in [0, 1, 10, 64] {
                let grid = build_onion(detail, coverage);
                assert!(grid.layer_group_count() <= MAX_ONION_LAYER_GROUPS);
                assert!(grid.ring_count() <= MAX_ONION_RINGS);
            }
        }
        assert_eq!(build_onion(8, 0).ring_count(), MAX_ONION_RINGS);
    }

    #[test]
    fn cell_count_increases_with_coverage() {
        for detail in 1..=8 {
            let mut prev = build_onion(detail, 0).total_cells();
            for coverage in 1..=64 {
                let cells = build_onion(detail, coverage).total_cells();
                assert!(cells > prev, "detail {detail} coverage {coverage}");
                prev = cells;
            }
        }
    }

    #[test]
    fn cell_count_increases_with_detail() {
        for coverage in [0, 5, 64] {
            let mut prev = build_onion(1, coverage).total_cells();
            for detail in 2..=8 {
                let cells = build_onion(detail, coverage).total_cells();
                assert!(cells > prev, "detail {detail} coverage {coverage}");
                prev = cells;
            }
        }
    }

    #[test]
    fn single_group_layout() {
        let grid = build_onion(1, 0);
        let g = grid.layer_groups[0];
        assert_eq!(g.layer_count, 1);
        assert_eq!(g.ring_count, 3);
        assert_eq!(g.layer_cell_offset, 1);
        // equator 8, ring at 45deg floor(8 * 0.707) = 5 (x2), pole ring clamped to 1 (x2)
        let counts: Vec<u32> = grid.rings.iter().map(|r| r.cell_count).collect();
        assert_eq!(counts, vec![8, 5, 1]);
        assert_eq!(g.cells_per_layer, 8 + 10 + 2);
        assert_eq!(grid.total_cells(), 21);
        // No inner group means no cubic-root samples.
        assert_eq!(grid.cubic_root_factor, 0.0);
        assert!(grid.linear_factor > 0.0);
    }

    #[test]
    fn radii_are_contiguous_and_increasing() {
        let grid = build_onion(6, 4);
        assert_eq!(grid.layer_groups[0].inner_radius, 1.0);
        for pair in grid.layer_groups.windows(2) {
            assert!(pair[0].inner_radius < pair[0].outer_radius);
            assert_eq!(pair[0].outer_radius, pair[1].inner_radius);
        }
        let last = grid.layer_groups.last().unwrap();
        assert_eq!(last.layer_count, 5);
    }

    #[test]
    fn ring_offsets_are_cumulative() {
        let grid = build_onion(8, 2);
        for g in &grid.layer_groups {
            let rings = &grid.rings[g.ring_range()];
            assert_eq!(rings[0].cell_offset, 0);
            assert_eq!(rings[1].cell_offset, rings[0].cell_count);
            for pair in rings[1..].windows(2) {
                assert_eq!(pair[1].cell_offset, pair[0].cell_offset + pair[0].cell_count * 2);
            }
            let last = rings.last().unwrap();
            assert_eq!(g.cells_per_layer, last.cell_offset + last.cell_count * 2);
        }
    }

    #[test]
    fn every_cell_has_a_unique_slot() {
        let grid = build_onion(4, 3);
        let mut seen = HashSet::new();
        for (gi, g) in grid.layer_groups.iter().enumerate() {
            for layer in 0..g.layer_count {
                for ring in 0..g.ring_count as usize {
                    let cells = grid.rings[g.ring_offset as usize + ring].cell_count;
                    for cell in 0..cells {
                        let hemispheres: &[bool] = if ring == 0 { &[false] } else { &[false, true] };
                        for &southern in hemispheres {
                            let slot = grid.cell_slot(gi, layer, ring, cell, southern).unwrap();
                            assert!(seen.insert(slot), "slot {slot} reused");
                        }
                    }
                }
            }
        }
        // Slot 0 belongs to the center cell.
        assert_eq!(seen.len() as u32, grid.total_cells() - 1);
        assert!(!seen.contains(&0));
        assert!(seen.iter().all(|&s| s < grid.total_cells()));
    }

    #[test]
    fn out_of_range_slot_is_none() {
        let grid = build_onion(2, 0);
        assert!(grid.cell_slot(2, 0, 0, 0, false).is_none());
        assert!(grid.cell_slot(0, 1, 0, 0, false).is_none());
        assert!(grid.cell_slot(0, 0, 0, 8, false).is_none());
    }

    #[test]
    fn jitter_factors_are_deterministic_and_positive() {
        let a = build_onion(5, 10);
        let b = build_onion(5, 10);
        assert_eq!(a.cubic_root_factor, b.cubic_root_factor);
        assert_eq!(a.linear_factor, b.linear_factor);
        assert!(a.cubic_root_factor > 0.0);
        assert!(a.linear_factor > 0.0);
    }

    #[test]
    fn cubic_root_factor_is_median_of_even_sample_count() {
        let grid = build_onion(5, 10);
        let (mut samples, linear) = jitter_samples(&grid.layer_groups, &grid.rings);
        // Four inner groups with one shell each.
        assert_eq!(samples.len(), 4);
        assert_eq!(linear.len(), 11);
        samples.sort_by(|a, b| a.total_cmp(b));
        let expected = (samples[1] + samples[2]) * 0.5;
        assert_eq!(grid.cubic_root_factor, expected);
        assert_ne!(grid.cubic_root_factor, samples[2]);
    }

    #[test]
    fn cubic_root_factor_is_middle_sample_for_odd_count() {
        let grid = build_onion(4, 0);
        let (mut samples, _) = jitter_samples(&grid.layer_groups, &grid.rings);
        assert_eq!(samples.len(), 3);
        samples.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(grid.cubic_root_factor, samples[1]);
    }

    #[test]
    fn gpu_pack_copies_layout() {
        let grid = build_onion(8, 10);
        let packed = grid.to_gpu().unwrap();
        assert_eq!(packed.num_layer_groups, 8);
        assert_eq!(packed.layers[7], grid.layer_groups[7]);
        assert_eq!(packed.rings[51], grid.rings[51]);
        assert_eq!(std::mem::size_of::<OnionLayerGroup>(), 48);
        assert_eq!(std::mem::size_of::<OnionRing>(), 16);
        assert_eq!(std::mem::size_of::<ReGirOnionParameters>(), 8 * 48 + 52 * 16 + 16);
    }
}
