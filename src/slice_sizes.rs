//! Slice size computation functions (13.2.3, 13.5.3.2, 13.5.6.2).
//!
//! All functions take the [`State`] entries filled in by
//! `set_coding_parameters` and `slice_parameters`: the component
//! dimensions, transform depths and slice counts. Arithmetic saturates
//! rather than overflowing so that malformed streams with absurd
//! parameters degrade to empty slices instead of aborting.

use crate::state::State;

/// (5.5.3) `intlog2`: ceiling of log2, by pure integer arithmetic.
pub fn intlog2(n: u64) -> u64 {
    if n <= 1 {
        0
    } else {
        64 - u64::from((n - 1).leading_zeros())
    }
}

/// A picture component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Y,
    C1,
    C2,
}

fn pow2(n: u64) -> u64 {
    1u64.checked_shl(n.min(64) as u32).unwrap_or(u64::MAX)
}

fn round_up_to(value: u64, multiple: u64) -> u64 {
    multiple.saturating_mul(value.saturating_add(multiple - 1) / multiple)
}

/// (13.2.3) The width of a subband at the given transform level.
pub fn subband_width(state: &State, level: u64, comp: Component) -> u64 {
    let w = match comp {
        Component::Y => state.luma_width,
        Component::C1 | Component::C2 => state.color_diff_width,
    };

    // Round up (pad) the picture width to the nearest multiple of the
    // scale width.
    let scale_w = pow2(state.dwt_depth_ho.saturating_add(state.dwt_depth));
    let pw = round_up_to(w, scale_w);

    if level == 0 {
        pw / pow2(state.dwt_depth_ho.saturating_add(state.dwt_depth))
    } else {
        pw / pow2(state.dwt_depth_ho.saturating_add(state.dwt_depth) - level + 1)
    }
}

/// (13.2.3) The height of a subband at the given transform level.
pub fn subband_height(state: &State, level: u64, comp: Component) -> u64 {
    let h = match comp {
        Component::Y => state.luma_height,
        Component::C1 | Component::C2 => state.color_diff_height,
    };

    let scale_h = pow2(state.dwt_depth);
    let ph = round_up_to(h, scale_h);

    if level <= state.dwt_depth_ho {
        ph / pow2(state.dwt_depth)
    } else {
        ph / pow2(state.dwt_depth_ho.saturating_add(state.dwt_depth) - level + 1)
    }
}

/// (13.5.3.2) The number of bytes in a low-delay picture slice.
pub fn slice_bytes(state: &State, sx: u64, sy: u64) -> u64 {
    let slice_number = (sy.saturating_mul(state.slices_x)).saturating_add(sx) as u128;
    let numerator = state.slice_bytes_numerator as u128;
    let denominator = state.slice_bytes_denominator.max(1) as u128;
    let bytes = ((slice_number + 1) * numerator) / denominator
        - (slice_number * numerator) / denominator;
    bytes.min(u64::MAX as u128) as u64
}

/// (13.5.6.2) The x coordinate of the left-hand edge of a slice within a
/// subband.
pub fn slice_left(state: &State, sx: u64, comp: Component, level: u64) -> u64 {
    subband_width(state, level, comp).saturating_mul(sx) / state.slices_x.max(1)
}

/// (13.5.6.2) The x coordinate of the right-hand edge of a slice within a
/// subband.
pub fn slice_right(state: &State, sx: u64, comp: Component, level: u64) -> u64 {
    subband_width(state, level, comp).saturating_mul(sx + 1) / state.slices_x.max(1)
}

/// (13.5.6.2) The y coordinate of the top edge of a slice within a
/// subband.
pub fn slice_top(state: &State, sy: u64, comp: Component, level: u64) -> u64 {
    subband_height(state, level, comp).saturating_mul(sy) / state.slices_y.max(1)
}

/// (13.5.6.2) The y coordinate of the bottom edge of a slice within a
/// subband.
pub fn slice_bottom(state: &State, sy: u64, comp: Component, level: u64) -> u64 {
    subband_height(state, level, comp).saturating_mul(sy + 1) / state.slices_y.max(1)
}
