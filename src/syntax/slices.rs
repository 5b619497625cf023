//! Transform data (13.5) and fragment data (14.4) syntax: the slice
//! coding loops.
//!
//! Rather than one record per slice, every slice in a run is accumulated
//! into the flat parallel lists of an `ld_slice_array` / `hq_slice_array`
//! record (see [`crate::slice_array`]). [`with_slice_array`] opens that
//! record, publishes the computed parameters needed to interpret it, and
//! declares each parallel list; the slice loops then simply append to the
//! lists as they walk the bitstream.

use crate::error::Result;
use crate::fixeddict::Value;
use crate::records;
use crate::serdes::SerDes;
use crate::slice_array::SliceArrayParameters;
use crate::slice_sizes::{
    intlog2, slice_bottom, slice_bytes, slice_left, slice_right, slice_top, Component,
};
use crate::state::{to_u64, State};

/// (13.5.2) Parse the transform data of a whole picture: every slice, in
/// raster order.
pub fn transform_data<S: SerDes>(serdes: &mut S, state: &State) -> Result<()> {
    with_slice_array(
        serdes,
        state,
        0,
        0,
        state.slices_x.saturating_mul(state.slices_y),
        |serdes| {
            for sy in 0..state.slices_y {
                for sx in 0..state.slices_x {
                    slice(serdes, state, sx, sy)?;
                }
            }
            Ok(())
        },
    )
}

/// (14.4) Parse the slice data of one fragment: `fragment_slice_count`
/// slices starting at the fragment's slice offset.
pub fn fragment_data<S: SerDes>(serdes: &mut S, state: &State) -> Result<()> {
    with_slice_array(
        serdes,
        state,
        state.fragment_x_offset,
        state.fragment_y_offset,
        state.fragment_slice_count,
        |serdes| {
            let slices_x = state.slices_x.max(1);
            for s in 0..state.fragment_slice_count {
                let n = state
                    .fragment_y_offset
                    .saturating_mul(slices_x)
                    .saturating_add(state.fragment_x_offset)
                    .saturating_add(s);
                slice(serdes, state, n % slices_x, n / slices_x)?;
            }
            Ok(())
        },
    )
}

/// Open the slice-array record for the current run of slices, publish its
/// computed parameters, and declare the parallel lists that the slice
/// loops append to.
fn with_slice_array<S: SerDes, F>(
    serdes: &mut S,
    state: &State,
    start_sx: u64,
    start_sy: u64,
    slice_count: u64,
    f: F,
) -> Result<()>
where
    F: FnOnce(&mut S) -> Result<()>,
{
    let parameters = SliceArrayParameters {
        slices_x: state.slices_x,
        slices_y: state.slices_y,
        start_sx,
        start_sy,
        slice_count,
        dwt_depth: state.dwt_depth,
        dwt_depth_ho: state.dwt_depth_ho,
        luma_width: state.luma_width,
        luma_height: state.luma_height,
        color_diff_width: state.color_diff_width,
        color_diff_height: state.color_diff_height,
    };

    let parse_code = state.parse_code;
    if parse_code.is_ld_picture() || parse_code.is_ld_fragment() {
        serdes.subcontext_enter("ld_slice_array")?;
        serdes.set_context_type(&records::LD_SLICE_ARRAY)?;
        serdes.computed_value("_parameters", Value::Record(parameters.to_record()))?;
        serdes.computed_value(
            "_slice_bytes_numerator",
            Value::from(state.slice_bytes_numerator),
        )?;
        serdes.computed_value(
            "_slice_bytes_denominator",
            Value::from(state.slice_bytes_denominator),
        )?;
        serdes.declare_list("slice_y_length")?;
        serdes.declare_list("y_block_padding")?;
        serdes.declare_list("c_block_padding")?;
        serdes.declare_list("qindex")?;
        serdes.declare_list("y_transform")?;
        serdes.declare_list("c_transform")?;
    } else if parse_code.is_hq_picture() || parse_code.is_hq_fragment() {
        serdes.subcontext_enter("hq_slice_array")?;
        serdes.set_context_type(&records::HQ_SLICE_ARRAY)?;
        serdes.computed_value("_parameters", Value::Record(parameters.to_record()))?;
        serdes.computed_value("_slice_prefix_bytes", Value::from(state.slice_prefix_bytes))?;
        serdes.computed_value("_slice_size_scaler", Value::from(state.slice_size_scaler))?;
        serdes.declare_list("prefix_bytes")?;
        serdes.declare_list("slice_y_length")?;
        serdes.declare_list("slice_c1_length")?;
        serdes.declare_list("slice_c2_length")?;
        serdes.declare_list("y_block_padding")?;
        serdes.declare_list("c1_block_padding")?;
        serdes.declare_list("c2_block_padding")?;
        serdes.declare_list("qindex")?;
        serdes.declare_list("y_transform")?;
        serdes.declare_list("c1_transform")?;
        serdes.declare_list("c2_transform")?;
    } else {
        // Slice data only occurs under picture or fragment parse codes.
        return Ok(());
    }

    f(serdes)?;

    serdes.subcontext_leave()?;
    Ok(())
}

/// (13.5.2) Parse one slice of the kind selected by the parse code.
fn slice<S: SerDes>(serdes: &mut S, state: &State, sx: u64, sy: u64) -> Result<()> {
    let parse_code = state.parse_code;
    if parse_code.is_ld_picture() || parse_code.is_ld_fragment() {
        ld_slice(serdes, state, sx, sy)
    } else if parse_code.is_hq_picture() || parse_code.is_hq_fragment() {
        hq_slice(serdes, state, sx, sy)
    } else {
        Ok(())
    }
}

/// The levels of every subband in bitstream order: the DC/L/LL band, one
/// `H` band per horizontal-only level, then three bands (HL, LH, HH) per
/// 2D level.
fn subband_levels(state: &State) -> Vec<u64> {
    let mut levels = vec![0];
    for level in 1..=state.dwt_depth_ho {
        levels.push(level);
    }
    for level in state.dwt_depth_ho + 1..=state.dwt_depth_ho.saturating_add(state.dwt_depth) {
        levels.extend_from_slice(&[level, level, level]);
    }
    levels
}

/// (13.5.3.1) Parse a low-delay slice: a fixed-size region split between
/// a luma block and an interleaved chroma block.
fn ld_slice<S: SerDes>(serdes: &mut S, state: &State, sx: u64, sy: u64) -> Result<()> {
    let mut slice_bits_left = 8 * slice_bytes(state, sx, sy);

    serdes.nbits("qindex", 7)?;
    slice_bits_left = slice_bits_left.saturating_sub(7);

    let length_bits = intlog2((8 * slice_bytes(state, sx, sy)).saturating_sub(7));
    let mut slice_y_length = to_u64(&serdes.nbits("slice_y_length", length_bits)?);
    slice_bits_left = slice_bits_left.saturating_sub(length_bits);

    // Not part of the standard: robustness in the presence of invalid
    // bitstreams whose stated length exceeds the slice.
    if slice_y_length > slice_bits_left {
        slice_y_length = slice_bits_left;
    }

    serdes.bounded_block_begin(slice_y_length)?;
    for level in subband_levels(state) {
        slice_band(serdes, state, "y_transform", level, sx, sy)?;
    }
    serdes.bounded_block_end("y_block_padding")?;

    slice_bits_left -= slice_y_length;

    serdes.bounded_block_begin(slice_bits_left)?;
    for level in subband_levels(state) {
        color_diff_slice_band(serdes, state, level, sx, sy)?;
    }
    serdes.bounded_block_end("c_block_padding")?;
    Ok(())
}

/// (13.5.4) Parse a high-quality slice: prefix bytes, qindex, then a
/// length-prefixed block per component.
fn hq_slice<S: SerDes>(serdes: &mut S, state: &State, sx: u64, sy: u64) -> Result<()> {
    serdes.bytes("prefix_bytes", state.slice_prefix_bytes)?;
    serdes.nbits("qindex", 8)?;

    for &(length_target, transform, padding_target) in &[
        ("slice_y_length", "y_transform", "y_block_padding"),
        ("slice_c1_length", "c1_transform", "c1_block_padding"),
        ("slice_c2_length", "c2_transform", "c2_block_padding"),
    ] {
        let length = state
            .slice_size_scaler
            .saturating_mul(to_u64(&serdes.nbits(length_target, 8)?));
        serdes.bounded_block_begin(length.saturating_mul(8))?;
        for level in subband_levels(state) {
            slice_band(serdes, state, transform, level, sx, sy)?;
        }
        serdes.bounded_block_end(padding_target)?;
    }
    Ok(())
}

/// (13.5.6.3) Parse one subband's coefficients within a slice.
fn slice_band<S: SerDes>(
    serdes: &mut S,
    state: &State,
    transform: &'static str,
    level: u64,
    sx: u64,
    sy: u64,
) -> Result<()> {
    let comp = if transform.starts_with('y') {
        Component::Y
    } else {
        Component::C1
    };
    let y1 = slice_top(state, sy, comp, level);
    let y2 = slice_bottom(state, sy, comp, level);
    let x1 = slice_left(state, sx, comp, level);
    let x2 = slice_right(state, sx, comp, level);

    for _y in y1..y2 {
        for _x in x1..x2 {
            serdes.sint(transform)?;
        }
    }
    Ok(())
}

/// (13.5.6.4) Parse one subband's interleaved colour-difference
/// coefficients within a low-delay slice.
fn color_diff_slice_band<S: SerDes>(
    serdes: &mut S,
    state: &State,
    level: u64,
    sx: u64,
    sy: u64,
) -> Result<()> {
    let y1 = slice_top(state, sy, Component::C1, level);
    let y2 = slice_bottom(state, sy, Component::C1, level);
    let x1 = slice_left(state, sx, Component::C1, level);
    let x2 = slice_right(state, sx, Component::C1, level);

    for _y in y1..y2 {
        for _x in x1..x2 {
            serdes.sint("c_transform")?; // C1
            serdes.sint("c_transform")?; // C2
        }
    }
    Ok(())
}
