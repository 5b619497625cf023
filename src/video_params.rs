//! Video parameter computation (11.4, 11.6): preset loading and component
//! dimension calculation.
//!
//! These are the purely functional parts of sequence-header processing;
//! no bitstream access. [`set_source_defaults`] seeds a
//! [`VideoParameters`] from a base video format; the `preset_*` setters
//! overlay preset table rows as custom flags select them; and
//! [`set_coding_parameters`] derives the picture component dimensions the
//! slice syntax depends on.

use crate::slice_sizes::intlog2;
use crate::state::State;
use crate::tables;

/// (11.4) The video parameters accumulated while parsing a sequence
/// header. Colour options are kept as preset table indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoParameters {
    pub frame_width: u64,
    pub frame_height: u64,
    pub color_diff_format_index: u64,
    pub source_sampling: u64,
    pub top_field_first: bool,
    pub frame_rate_numer: u64,
    pub frame_rate_denom: u64,
    pub pixel_aspect_ratio_numer: u64,
    pub pixel_aspect_ratio_denom: u64,
    pub clean_width: u64,
    pub clean_height: u64,
    pub left_offset: u64,
    pub top_offset: u64,
    pub luma_offset: u64,
    pub luma_excursion: u64,
    pub color_diff_offset: u64,
    pub color_diff_excursion: u64,
    pub color_primaries_index: u64,
    pub color_matrix_index: u64,
    pub transfer_function_index: u64,
}

/// (11.4.2) Create a [`VideoParameters`] with the values specified by a
/// base video format. Unknown indices fall back to the custom format.
pub fn set_source_defaults(base_video_format: u64) -> VideoParameters {
    let base = tables::base_video_format_parameters(base_video_format)
        .or_else(|| tables::base_video_format_parameters(0))
        .expect("base video format 0 is always defined");
    let (frame_rate_numer, frame_rate_denom) =
        tables::preset_frame_rate(base.frame_rate_index).unwrap_or((24, 1));
    let (pixel_aspect_ratio_numer, pixel_aspect_ratio_denom) =
        tables::preset_pixel_aspect_ratio(base.pixel_aspect_ratio_index).unwrap_or((1, 1));
    let signal_range = tables::preset_signal_range(base.signal_range_index)
        .unwrap_or(tables::SignalRangeParameters {
            luma_offset: 0,
            luma_excursion: 255,
            color_diff_offset: 128,
            color_diff_excursion: 255,
        });
    let (color_primaries_index, color_matrix_index, transfer_function_index) =
        tables::preset_color_spec(base.color_spec_index).unwrap_or((0, 0, 0));

    VideoParameters {
        frame_width: base.frame_width,
        frame_height: base.frame_height,
        color_diff_format_index: base.color_diff_format_index,
        source_sampling: base.source_sampling,
        top_field_first: base.top_field_first,
        frame_rate_numer,
        frame_rate_denom,
        pixel_aspect_ratio_numer,
        pixel_aspect_ratio_denom,
        clean_width: base.clean_width,
        clean_height: base.clean_height,
        left_offset: base.left_offset,
        top_offset: base.top_offset,
        luma_offset: signal_range.luma_offset,
        luma_excursion: signal_range.luma_excursion,
        color_diff_offset: signal_range.color_diff_offset,
        color_diff_excursion: signal_range.color_diff_excursion,
        color_primaries_index,
        color_matrix_index,
        transfer_function_index,
    }
}

/// (11.4.6) Overlay a preset frame rate. Unknown indices are ignored.
pub fn preset_frame_rate(video_parameters: &mut VideoParameters, index: u64) {
    if let Some((numer, denom)) = tables::preset_frame_rate(index) {
        video_parameters.frame_rate_numer = numer;
        video_parameters.frame_rate_denom = denom;
    }
}

/// (11.4.7) Overlay a preset pixel aspect ratio.
pub fn preset_pixel_aspect_ratio(video_parameters: &mut VideoParameters, index: u64) {
    if let Some((numer, denom)) = tables::preset_pixel_aspect_ratio(index) {
        video_parameters.pixel_aspect_ratio_numer = numer;
        video_parameters.pixel_aspect_ratio_denom = denom;
    }
}

/// (11.4.9) Overlay a preset signal range.
pub fn preset_signal_range(video_parameters: &mut VideoParameters, index: u64) {
    if let Some(preset) = tables::preset_signal_range(index) {
        video_parameters.luma_offset = preset.luma_offset;
        video_parameters.luma_excursion = preset.luma_excursion;
        video_parameters.color_diff_offset = preset.color_diff_offset;
        video_parameters.color_diff_excursion = preset.color_diff_excursion;
    }
}

/// (11.4.10.2) Overlay a preset colour primaries index.
pub fn preset_color_primaries(video_parameters: &mut VideoParameters, index: u64) {
    video_parameters.color_primaries_index = index;
}

/// (11.4.10.3) Overlay a preset colour matrix index.
pub fn preset_color_matrix(video_parameters: &mut VideoParameters, index: u64) {
    video_parameters.color_matrix_index = index;
}

/// (11.4.10.4) Overlay a preset transfer function index.
pub fn preset_transfer_function(video_parameters: &mut VideoParameters, index: u64) {
    video_parameters.transfer_function_index = index;
}

/// (11.4.10.1) Overlay a whole preset colour specification.
pub fn preset_color_spec(video_parameters: &mut VideoParameters, index: u64) {
    if let Some((primaries, matrix, transfer_function)) = tables::preset_color_spec(index) {
        preset_color_primaries(video_parameters, primaries);
        preset_color_matrix(video_parameters, matrix);
        preset_transfer_function(video_parameters, transfer_function);
    }
}

/// (11.6.1) Derive the coding parameters for a picture coding mode.
pub fn set_coding_parameters(
    state: &mut State,
    video_parameters: &VideoParameters,
    picture_coding_mode: u64,
) {
    picture_dimensions(state, video_parameters, picture_coding_mode);
    video_depth(state, video_parameters);
}

/// (11.6.2) Compute the picture component dimensions.
fn picture_dimensions(
    state: &mut State,
    video_parameters: &VideoParameters,
    picture_coding_mode: u64,
) {
    state.luma_width = video_parameters.frame_width;
    state.luma_height = video_parameters.frame_height;
    state.color_diff_width = state.luma_width;
    state.color_diff_height = state.luma_height;

    // color_4_2_2 halves the chroma width; color_4_2_0 halves both chroma
    // dimensions.
    if video_parameters.color_diff_format_index == 1 {
        state.color_diff_width /= 2;
    }
    if video_parameters.color_diff_format_index == 2 {
        state.color_diff_width /= 2;
        state.color_diff_height /= 2;
    }

    // pictures_are_fields
    if picture_coding_mode == 1 {
        state.luma_height /= 2;
        state.color_diff_height /= 2;
    }
}

/// (11.6.3) Compute the bits-per-sample of the decoded video.
fn video_depth(state: &mut State, video_parameters: &VideoParameters) {
    state.luma_depth = intlog2(video_parameters.luma_excursion + 1);
    state.color_diff_depth = intlog2(video_parameters.color_diff_excursion + 1);
}
