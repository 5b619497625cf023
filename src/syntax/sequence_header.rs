//! Sequence header parsing (11): parse parameters and the video source
//! parameter overrides.

use crate::error::Result;
use crate::records;
use crate::serdes::SerDes;
use crate::state::{to_u64, State};
use crate::tables;
use crate::video_params::{self, set_coding_parameters, set_source_defaults, VideoParameters};

/// (11.1) Parse a sequence header, returning the resulting video
/// parameters.
pub fn sequence_header<S: SerDes>(serdes: &mut S, state: &mut State) -> Result<VideoParameters> {
    serdes.set_context_type(&records::SEQUENCE_HEADER)?;
    serdes.byte_align("padding")?;

    serdes.subcontext("parse_parameters", |serdes| parse_parameters(serdes, state))?;

    let mut base_video_format = to_u64(&serdes.uint("base_video_format")?);
    // For robustness against bad bitstreams, force unrecognised base
    // formats to 'custom'.
    if tables::base_video_format_parameters(base_video_format).is_none() {
        base_video_format = 0;
    }

    let video_parameters = serdes.subcontext("video_parameters", |serdes| {
        source_parameters(serdes, base_video_format)
    })?;
    let picture_coding_mode = to_u64(&serdes.uint("picture_coding_mode")?);
    set_coding_parameters(state, &video_parameters, picture_coding_mode);

    Ok(video_parameters)
}

/// (11.2.1) Parse the parse parameters.
pub fn parse_parameters<S: SerDes>(serdes: &mut S, state: &mut State) -> Result<()> {
    serdes.set_context_type(&records::PARSE_PARAMETERS)?;
    state.major_version = to_u64(&serdes.uint("major_version")?);
    state.minor_version = to_u64(&serdes.uint("minor_version")?);
    state.profile = to_u64(&serdes.uint("profile")?);
    state.level = to_u64(&serdes.uint("level")?);
    Ok(())
}

/// (11.4.1) Parse the video source parameters, starting from the defaults
/// of the given base video format.
pub fn source_parameters<S: SerDes>(
    serdes: &mut S,
    base_video_format: u64,
) -> Result<VideoParameters> {
    serdes.set_context_type(&records::SOURCE_PARAMETERS)?;
    let mut video_parameters = set_source_defaults(base_video_format);

    serdes.subcontext("frame_size", |serdes| {
        frame_size(serdes, &mut video_parameters)
    })?;
    serdes.subcontext("color_diff_sampling_format", |serdes| {
        color_diff_sampling_format(serdes, &mut video_parameters)
    })?;
    serdes.subcontext("scan_format", |serdes| {
        scan_format(serdes, &mut video_parameters)
    })?;
    serdes.subcontext("frame_rate", |serdes| {
        frame_rate(serdes, &mut video_parameters)
    })?;
    serdes.subcontext("pixel_aspect_ratio", |serdes| {
        pixel_aspect_ratio(serdes, &mut video_parameters)
    })?;
    serdes.subcontext("clean_area", |serdes| {
        clean_area(serdes, &mut video_parameters)
    })?;
    serdes.subcontext("signal_range", |serdes| {
        signal_range(serdes, &mut video_parameters)
    })?;
    serdes.subcontext("color_spec", |serdes| {
        color_spec(serdes, &mut video_parameters)
    })?;

    Ok(video_parameters)
}

/// (11.4.3) Frame size override.
pub fn frame_size<S: SerDes>(
    serdes: &mut S,
    video_parameters: &mut VideoParameters,
) -> Result<()> {
    serdes.set_context_type(&records::FRAME_SIZE)?;
    if serdes.bool("custom_dimensions_flag")? {
        video_parameters.frame_width = to_u64(&serdes.uint("frame_width")?);
        video_parameters.frame_height = to_u64(&serdes.uint("frame_height")?);
    }
    Ok(())
}

/// (11.4.4) Colour-difference sampling override.
pub fn color_diff_sampling_format<S: SerDes>(
    serdes: &mut S,
    video_parameters: &mut VideoParameters,
) -> Result<()> {
    serdes.set_context_type(&records::COLOR_DIFF_SAMPLING_FORMAT)?;
    if serdes.bool("custom_color_diff_format_flag")? {
        video_parameters.color_diff_format_index =
            to_u64(&serdes.uint("color_diff_format_index")?);
    }
    Ok(())
}

/// (11.4.5) Scan format override.
pub fn scan_format<S: SerDes>(
    serdes: &mut S,
    video_parameters: &mut VideoParameters,
) -> Result<()> {
    serdes.set_context_type(&records::SCAN_FORMAT)?;
    if serdes.bool("custom_scan_format_flag")? {
        video_parameters.source_sampling = to_u64(&serdes.uint("source_sampling")?);
    }
    Ok(())
}

/// (11.4.6) Frame rate override.
pub fn frame_rate<S: SerDes>(
    serdes: &mut S,
    video_parameters: &mut VideoParameters,
) -> Result<()> {
    serdes.set_context_type(&records::FRAME_RATE)?;
    if serdes.bool("custom_frame_rate_flag")? {
        let mut index = to_u64(&serdes.uint("index")?);

        // Not part of the standard, but required to survive malformed inputs:
        // make an arbitrary choice for unknown preset indices.
        if index != 0 && tables::preset_frame_rate(index).is_none() {
            index = 1;
        }

        if index == 0 {
            video_parameters.frame_rate_numer = to_u64(&serdes.uint("frame_rate_numer")?);
            video_parameters.frame_rate_denom = to_u64(&serdes.uint("frame_rate_denom")?);
        } else {
            video_params::preset_frame_rate(video_parameters, index);
        }
    }
    Ok(())
}

/// (11.4.7) Pixel aspect ratio override.
pub fn pixel_aspect_ratio<S: SerDes>(
    serdes: &mut S,
    video_parameters: &mut VideoParameters,
) -> Result<()> {
    serdes.set_context_type(&records::PIXEL_ASPECT_RATIO)?;
    if serdes.bool("custom_pixel_aspect_ratio_flag")? {
        let mut index = to_u64(&serdes.uint("index")?);

        if index != 0 && tables::preset_pixel_aspect_ratio(index).is_none() {
            index = 1;
        }

        if index == 0 {
            video_parameters.pixel_aspect_ratio_numer =
                to_u64(&serdes.uint("pixel_aspect_ratio_numer")?);
            video_parameters.pixel_aspect_ratio_denom =
                to_u64(&serdes.uint("pixel_aspect_ratio_denom")?);
        } else {
            video_params::preset_pixel_aspect_ratio(video_parameters, index);
        }
    }
    Ok(())
}

/// (11.4.8) Clean area override.
pub fn clean_area<S: SerDes>(
    serdes: &mut S,
    video_parameters: &mut VideoParameters,
) -> Result<()> {
    serdes.set_context_type(&records::CLEAN_AREA)?;
    if serdes.bool("custom_clean_area_flag")? {
        video_parameters.clean_width = to_u64(&serdes.uint("clean_width")?);
        video_parameters.clean_height = to_u64(&serdes.uint("clean_height")?);
        video_parameters.left_offset = to_u64(&serdes.uint("left_offset")?);
        video_parameters.top_offset = to_u64(&serdes.uint("top_offset")?);
    }
    Ok(())
}

/// (11.4.9) Signal range override.
pub fn signal_range<S: SerDes>(
    serdes: &mut S,
    video_parameters: &mut VideoParameters,
) -> Result<()> {
    serdes.set_context_type(&records::SIGNAL_RANGE)?;
    if serdes.bool("custom_signal_range_flag")? {
        let mut index = to_u64(&serdes.uint("index")?);

        if index != 0 && tables::preset_signal_range(index).is_none() {
            index = 1;
        }

        if index == 0 {
            video_parameters.luma_offset = to_u64(&serdes.uint("luma_offset")?);
            video_parameters.luma_excursion = to_u64(&serdes.uint("luma_excursion")?);
            video_parameters.color_diff_offset = to_u64(&serdes.uint("color_diff_offset")?);
            video_parameters.color_diff_excursion =
                to_u64(&serdes.uint("color_diff_excursion")?);
        } else {
            video_params::preset_signal_range(video_parameters, index);
        }
    }
    Ok(())
}

/// (11.4.10.1) Colour specification override.
pub fn color_spec<S: SerDes>(
    serdes: &mut S,
    video_parameters: &mut VideoParameters,
) -> Result<()> {
    serdes.set_context_type(&records::COLOR_SPEC)?;
    if serdes.bool("custom_color_spec_flag")? {
        let mut index = to_u64(&serdes.uint("index")?);

        if tables::preset_color_spec(index).is_none() {
            index = 1;
        }

        video_params::preset_color_spec(video_parameters, index);
        if index == 0 {
            serdes.subcontext("color_primaries", |serdes| {
                color_primaries(serdes, video_parameters)
            })?;
            serdes.subcontext("color_matrix", |serdes| {
                color_matrix(serdes, video_parameters)
            })?;
            serdes.subcontext("transfer_function", |serdes| {
                transfer_function(serdes, video_parameters)
            })?;
        }
    }
    Ok(())
}

/// (11.4.10.2) Colour primaries override.
pub fn color_primaries<S: SerDes>(
    serdes: &mut S,
    video_parameters: &mut VideoParameters,
) -> Result<()> {
    serdes.set_context_type(&records::COLOR_PRIMARIES)?;
    if serdes.bool("custom_color_primaries_flag")? {
        let mut index = to_u64(&serdes.uint("index")?);
        if index > 4 {
            index = 0;
        }
        video_params::preset_color_primaries(video_parameters, index);
    }
    Ok(())
}

/// (11.4.10.3) Colour matrix override.
pub fn color_matrix<S: SerDes>(
    serdes: &mut S,
    video_parameters: &mut VideoParameters,
) -> Result<()> {
    serdes.set_context_type(&records::COLOR_MATRIX)?;
    if serdes.bool("custom_color_matrix_flag")? {
        let mut index = to_u64(&serdes.uint("index")?);
        if index > 4 {
            index = 0;
        }
        video_params::preset_color_matrix(video_parameters, index);
    }
    Ok(())
}

/// (11.4.10.4) Transfer function override.
pub fn transfer_function<S: SerDes>(
    serdes: &mut S,
    video_parameters: &mut VideoParameters,
) -> Result<()> {
    serdes.set_context_type(&records::TRANSFER_FUNCTION)?;
    if serdes.bool("custom_transfer_function_flag")? {
        let mut index = to_u64(&serdes.uint("index")?);
        if index > 5 {
            index = 0;
        }
        video_params::preset_transfer_function(video_parameters, index);
    }
    Ok(())
}
