//! Record schemas for every structure in a deserialised VC-2 stream,
//! mirroring the bitstream hierarchy, plus the default-value tables used
//! by the serialiser.
//!
//! The hierarchy is rooted at [`STREAM`]: a stream holds
//! `sequences`, a sequence holds `data_units`, and each data unit holds a
//! `parse_info` header plus at most one of `sequence_header`,
//! `picture_parse`, `fragment_parse`, `auxiliary_data` or `padding`.
//! Slice data is flattened into the `ld_slice_array` / `hq_slice_array`
//! records (see [`crate::slice_array`]).
//!
//! Keys beginning with `_` are computed values: they carry information
//! (byte offsets, slice array parameters) which is not itself part of the
//! bitstream.

use std::collections::HashMap;

use bitvec::vec::BitVec;

use crate::fixeddict::{Entry, Formatter, RecordSchema, Value};
use crate::serdes::DefaultValues;
use crate::tables;

fn empty_bits() -> Value {
    Value::Bits(BitVec::new())
}

pub static STREAM: RecordSchema = RecordSchema {
    name: "Stream",
    entries: &[Entry::new("sequences")],
};

pub static SEQUENCE: RecordSchema = RecordSchema {
    name: "Sequence",
    entries: &[Entry::new("data_units")],
};

pub static DATA_UNIT: RecordSchema = RecordSchema {
    name: "DataUnit",
    entries: &[
        Entry::new("parse_info"),
        Entry::new("sequence_header"),
        Entry::new("picture_parse"),
        Entry::new("fragment_parse"),
        Entry::new("auxiliary_data"),
        Entry::new("padding"),
    ],
};

/// (10.5.1) `parse_info()`.
pub static PARSE_INFO: RecordSchema = RecordSchema {
    name: "ParseInfo",
    entries: &[
        Entry::new("padding"),
        Entry::new("parse_info_prefix").formatter(Formatter::Hex(8)),
        Entry::new("parse_code")
            .formatter(Formatter::Hex(2))
            .variants(tables::PARSE_CODES),
        Entry::new("next_parse_offset"),
        Entry::new("previous_parse_offset"),
        // The byte offset of this parse_info in the stream; filled in
        // during (de)serialisation for parse-offset auto-filling.
        Entry::new("_offset"),
    ],
};

/// (11.1) `sequence_header()`.
pub static SEQUENCE_HEADER: RecordSchema = RecordSchema {
    name: "SequenceHeader",
    entries: &[
        Entry::new("padding"),
        Entry::new("parse_parameters"),
        Entry::new("base_video_format").variants(tables::BASE_VIDEO_FORMATS),
        Entry::new("video_parameters"),
        Entry::new("picture_coding_mode").variants(tables::PICTURE_CODING_MODES),
    ],
};

/// (11.2.1) `parse_parameters()`.
pub static PARSE_PARAMETERS: RecordSchema = RecordSchema {
    name: "ParseParameters",
    entries: &[
        Entry::new("major_version"),
        Entry::new("minor_version"),
        Entry::new("profile").variants(tables::PROFILES),
        Entry::new("level").variants(tables::LEVELS),
    ],
};

/// (11.4.1) `source_parameters()`.
pub static SOURCE_PARAMETERS: RecordSchema = RecordSchema {
    name: "SourceParameters",
    entries: &[
        Entry::new("frame_size"),
        Entry::new("color_diff_sampling_format"),
        Entry::new("scan_format"),
        Entry::new("frame_rate"),
        Entry::new("pixel_aspect_ratio"),
        Entry::new("clean_area"),
        Entry::new("signal_range"),
        Entry::new("color_spec"),
    ],
};

/// (11.4.3) `frame_size()`.
pub static FRAME_SIZE: RecordSchema = RecordSchema {
    name: "FrameSize",
    entries: &[
        Entry::new("custom_dimensions_flag"),
        Entry::new("frame_width"),
        Entry::new("frame_height"),
    ],
};

/// (11.4.4) `color_diff_sampling_format()`.
pub static COLOR_DIFF_SAMPLING_FORMAT: RecordSchema = RecordSchema {
    name: "ColorDiffSamplingFormat",
    entries: &[
        Entry::new("custom_color_diff_format_flag"),
        Entry::new("color_diff_format_index").variants(tables::COLOR_DIFF_SAMPLING_FORMATS),
    ],
};

/// (11.4.5) `scan_format()`.
pub static SCAN_FORMAT: RecordSchema = RecordSchema {
    name: "ScanFormat",
    entries: &[
        Entry::new("custom_scan_format_flag"),
        Entry::new("source_sampling").variants(tables::SOURCE_SAMPLING_MODES),
    ],
};

/// (11.4.6) `frame_rate()`.
pub static FRAME_RATE: RecordSchema = RecordSchema {
    name: "FrameRate",
    entries: &[
        Entry::new("custom_frame_rate_flag"),
        Entry::new("index").variants(tables::PRESET_FRAME_RATES),
        Entry::new("frame_rate_numer"),
        Entry::new("frame_rate_denom"),
    ],
};

/// (11.4.7) `pixel_aspect_ratio()`.
pub static PIXEL_ASPECT_RATIO: RecordSchema = RecordSchema {
    name: "PixelAspectRatio",
    entries: &[
        Entry::new("custom_pixel_aspect_ratio_flag"),
        Entry::new("index").variants(tables::PRESET_PIXEL_ASPECT_RATIOS),
        Entry::new("pixel_aspect_ratio_numer"),
        Entry::new("pixel_aspect_ratio_denom"),
    ],
};

/// (11.4.8) `clean_area()`.
pub static CLEAN_AREA: RecordSchema = RecordSchema {
    name: "CleanArea",
    entries: &[
        Entry::new("custom_clean_area_flag"),
        Entry::new("clean_width"),
        Entry::new("clean_height"),
        Entry::new("left_offset"),
        Entry::new("top_offset"),
    ],
};

/// (11.4.9) `signal_range()`.
pub static SIGNAL_RANGE: RecordSchema = RecordSchema {
    name: "SignalRange",
    entries: &[
        Entry::new("custom_signal_range_flag"),
        Entry::new("index").variants(tables::PRESET_SIGNAL_RANGES),
        Entry::new("luma_offset"),
        Entry::new("luma_excursion"),
        Entry::new("color_diff_offset"),
        Entry::new("color_diff_excursion"),
    ],
};

/// (11.4.10.1) `color_spec()`.
pub static COLOR_SPEC: RecordSchema = RecordSchema {
    name: "ColorSpec",
    entries: &[
        Entry::new("custom_color_spec_flag"),
        Entry::new("index").variants(tables::PRESET_COLOR_SPECS),
        Entry::new("color_primaries"),
        Entry::new("color_matrix"),
        Entry::new("transfer_function"),
    ],
};

/// (11.4.10.2) `color_primaries()`.
pub static COLOR_PRIMARIES: RecordSchema = RecordSchema {
    name: "ColorPrimaries",
    entries: &[
        Entry::new("custom_color_primaries_flag"),
        Entry::new("index").variants(tables::PRESET_COLOR_PRIMARIES),
    ],
};

/// (11.4.10.3) `color_matrix()`.
pub static COLOR_MATRIX: RecordSchema = RecordSchema {
    name: "ColorMatrix",
    entries: &[
        Entry::new("custom_color_matrix_flag"),
        Entry::new("index").variants(tables::PRESET_COLOR_MATRICES),
    ],
};

/// (11.4.10.4) `transfer_function()`.
pub static TRANSFER_FUNCTION: RecordSchema = RecordSchema {
    name: "TransferFunction",
    entries: &[
        Entry::new("custom_transfer_function_flag"),
        Entry::new("index").variants(tables::PRESET_TRANSFER_FUNCTIONS),
    ],
};

/// (10.4.4) `auxiliary_data()`.
pub static AUXILIARY_DATA: RecordSchema = RecordSchema {
    name: "AuxiliaryData",
    entries: &[Entry::new("padding"), Entry::new("bytes")],
};

/// (10.4.5) `padding()`.
pub static PADDING: RecordSchema = RecordSchema {
    name: "Padding",
    entries: &[Entry::new("padding"), Entry::new("bytes")],
};

/// (12.1) `picture_parse()`.
pub static PICTURE_PARSE: RecordSchema = RecordSchema {
    name: "PictureParse",
    entries: &[
        Entry::new("padding1"),
        Entry::new("picture_header"),
        Entry::new("padding2"),
        Entry::new("wavelet_transform"),
    ],
};

/// (12.2) `picture_header()`.
pub static PICTURE_HEADER: RecordSchema = RecordSchema {
    name: "PictureHeader",
    entries: &[Entry::new("picture_number")],
};

/// (12.3) `wavelet_transform()`.
pub static WAVELET_TRANSFORM: RecordSchema = RecordSchema {
    name: "WaveletTransform",
    entries: &[
        Entry::new("transform_parameters"),
        Entry::new("padding"),
        Entry::new("ld_slice_array"),
        Entry::new("hq_slice_array"),
    ],
};

/// (12.4.1) `transform_parameters()`.
pub static TRANSFORM_PARAMETERS: RecordSchema = RecordSchema {
    name: "TransformParameters",
    entries: &[
        Entry::new("wavelet_index").variants(tables::WAVELET_FILTERS),
        Entry::new("dwt_depth"),
        Entry::new("extended_transform_parameters"),
        Entry::new("slice_parameters"),
        Entry::new("quant_matrix"),
    ],
};

/// (12.4.4.1) `extended_transform_parameters()`.
pub static EXTENDED_TRANSFORM_PARAMETERS: RecordSchema = RecordSchema {
    name: "ExtendedTransformParameters",
    entries: &[
        Entry::new("asym_transform_index_flag"),
        Entry::new("wavelet_index_ho").variants(tables::WAVELET_FILTERS),
        Entry::new("asym_transform_flag"),
        Entry::new("dwt_depth_ho"),
    ],
};

/// (12.4.5.2) `slice_parameters()`.
pub static SLICE_PARAMETERS: RecordSchema = RecordSchema {
    name: "SliceParameters",
    entries: &[
        Entry::new("slices_x"),
        Entry::new("slices_y"),
        Entry::new("slice_bytes_numerator"),
        Entry::new("slice_bytes_denominator"),
        Entry::new("slice_prefix_bytes"),
        Entry::new("slice_size_scaler"),
    ],
};

/// (12.4.5.3) `quant_matrix()`.
pub static QUANT_MATRIX: RecordSchema = RecordSchema {
    name: "QuantMatrix",
    entries: &[
        Entry::new("custom_quant_matrix"),
        Entry::new("quant_matrix"),
    ],
};

/// (14.1) `fragment_parse()`.
pub static FRAGMENT_PARSE: RecordSchema = RecordSchema {
    name: "FragmentParse",
    entries: &[
        Entry::new("padding1"),
        Entry::new("fragment_header"),
        Entry::new("padding2"),
        Entry::new("transform_parameters"),
        Entry::new("ld_slice_array"),
        Entry::new("hq_slice_array"),
    ],
};

/// (14.2) `fragment_header()`.
pub static FRAGMENT_HEADER: RecordSchema = RecordSchema {
    name: "FragmentHeader",
    entries: &[
        Entry::new("picture_number"),
        Entry::new("fragment_data_length"),
        Entry::new("fragment_slice_count"),
        Entry::new("fragment_x_offset"),
        Entry::new("fragment_y_offset"),
    ],
};

/// (13.5.3.1) Consecutive low-delay slices, as parallel flat lists. The
/// colour-difference components are interleaved in `c_transform`.
pub static LD_SLICE_ARRAY: RecordSchema = RecordSchema {
    name: "LDSliceArray",
    entries: &[
        Entry::new("qindex"),
        Entry::new("slice_y_length"),
        Entry::new("y_transform"),
        Entry::new("y_block_padding"),
        Entry::new("c_transform"),
        Entry::new("c_block_padding"),
        Entry::new("_parameters"),
        Entry::new("_slice_bytes_numerator"),
        Entry::new("_slice_bytes_denominator"),
    ],
};

/// (13.5.4) Consecutive high-quality slices, as parallel flat lists.
pub static HQ_SLICE_ARRAY: RecordSchema = RecordSchema {
    name: "HQSliceArray",
    entries: &[
        Entry::new("prefix_bytes"),
        Entry::new("qindex"),
        Entry::new("slice_y_length"),
        Entry::new("slice_c1_length"),
        Entry::new("slice_c2_length"),
        Entry::new("y_transform"),
        Entry::new("c1_transform"),
        Entry::new("c2_transform"),
        Entry::new("y_block_padding"),
        Entry::new("c1_block_padding"),
        Entry::new("c2_block_padding"),
        Entry::new("_parameters"),
        Entry::new("_slice_prefix_bytes"),
        Entry::new("_slice_size_scaler"),
    ],
};

/// Computed slice-array parameters (see
/// [`crate::slice_array::SliceArrayParameters`]).
pub static SLICE_ARRAY_PARAMETERS: RecordSchema = RecordSchema {
    name: "SliceArrayParameters",
    entries: &[
        Entry::new("slices_x").default(|| Value::from(1u8)),
        Entry::new("slices_y").default(|| Value::from(1u8)),
        Entry::new("start_sx").default(|| Value::from(0u8)),
        Entry::new("start_sy").default(|| Value::from(0u8)),
        Entry::new("slice_count").default(|| Value::from(1u8)),
        Entry::new("dwt_depth").default(|| Value::from(0u8)),
        Entry::new("dwt_depth_ho").default(|| Value::from(0u8)),
        Entry::new("luma_width").default(|| Value::from(1u8)),
        Entry::new("luma_height").default(|| Value::from(1u8)),
        Entry::new("color_diff_width").default(|| Value::from(1u8)),
        Entry::new("color_diff_height").default(|| Value::from(1u8)),
    ],
};

fn insert(
    table: &mut DefaultValues,
    schema: &'static RecordSchema,
    values: Vec<(&'static str, Value)>,
) {
    table.insert(schema.name, values.into_iter().collect::<HashMap<_, _>>());
}

/// Default values for every bitstream field, chosen to produce a minimal
/// but valid stream. Pass to
/// [`Serialiser::new`](crate::serdes::Serialiser::new) to avoid spelling
/// out constants (the parse-info prefix, zero padding, ...) in every input
/// tree.
///
/// For list-valued fields the default applies to list *elements* beyond
/// the end of the provided list.
pub fn default_values() -> DefaultValues {
    let mut table = DefaultValues::new();

    insert(
        &mut table,
        &PARSE_INFO,
        vec![
            ("padding", empty_bits()),
            ("parse_info_prefix", Value::from(tables::PARSE_INFO_PREFIX)),
            ("parse_code", Value::from(tables::ParseCode::END_OF_SEQUENCE.0)),
            ("next_parse_offset", Value::from(0u8)),
            ("previous_parse_offset", Value::from(0u8)),
        ],
    );

    insert(
        &mut table,
        &SEQUENCE_HEADER,
        vec![
            ("padding", empty_bits()),
            ("base_video_format", Value::from(0u8)),
            ("picture_coding_mode", Value::from(0u8)),
        ],
    );

    insert(
        &mut table,
        &PARSE_PARAMETERS,
        vec![
            ("major_version", Value::from(3u8)),
            ("minor_version", Value::from(0u8)),
            ("profile", Value::from(tables::PROFILE_HIGH_QUALITY)),
            ("level", Value::from(0u8)),
        ],
    );

    insert(
        &mut table,
        &FRAME_SIZE,
        vec![
            ("custom_dimensions_flag", Value::Bool(false)),
            ("frame_width", Value::from(1u8)),
            ("frame_height", Value::from(1u8)),
        ],
    );

    insert(
        &mut table,
        &COLOR_DIFF_SAMPLING_FORMAT,
        vec![
            ("custom_color_diff_format_flag", Value::Bool(false)),
            ("color_diff_format_index", Value::from(0u8)),
        ],
    );

    insert(
        &mut table,
        &SCAN_FORMAT,
        vec![
            ("custom_scan_format_flag", Value::Bool(false)),
            ("source_sampling", Value::from(0u8)),
        ],
    );

    insert(
        &mut table,
        &FRAME_RATE,
        vec![
            ("custom_frame_rate_flag", Value::Bool(false)),
            ("index", Value::from(3u8)),
            ("frame_rate_numer", Value::from(25u8)),
            ("frame_rate_denom", Value::from(1u8)),
        ],
    );

    insert(
        &mut table,
        &PIXEL_ASPECT_RATIO,
        vec![
            ("custom_pixel_aspect_ratio_flag", Value::Bool(false)),
            ("index", Value::from(1u8)),
            ("pixel_aspect_ratio_numer", Value::from(1u8)),
            ("pixel_aspect_ratio_denom", Value::from(1u8)),
        ],
    );

    insert(
        &mut table,
        &CLEAN_AREA,
        vec![
            ("custom_clean_area_flag", Value::Bool(false)),
            ("clean_width", Value::from(1u8)),
            ("clean_height", Value::from(1u8)),
            ("left_offset", Value::from(0u8)),
            ("top_offset", Value::from(0u8)),
        ],
    );

    insert(
        &mut table,
        &SIGNAL_RANGE,
        vec![
            ("custom_signal_range_flag", Value::Bool(false)),
            ("index", Value::from(1u8)),
            ("luma_offset", Value::from(0u8)),
            ("luma_excursion", Value::from(1u8)),
            ("color_diff_offset", Value::from(0u8)),
            ("color_diff_excursion", Value::from(1u8)),
        ],
    );

    insert(
        &mut table,
        &COLOR_SPEC,
        vec![
            ("custom_color_spec_flag", Value::Bool(false)),
            ("index", Value::from(3u8)),
        ],
    );

    insert(
        &mut table,
        &COLOR_PRIMARIES,
        vec![
            ("custom_color_primaries_flag", Value::Bool(false)),
            ("index", Value::from(0u8)),
        ],
    );

    insert(
        &mut table,
        &COLOR_MATRIX,
        vec![
            ("custom_color_matrix_flag", Value::Bool(false)),
            ("index", Value::from(0u8)),
        ],
    );

    insert(
        &mut table,
        &TRANSFER_FUNCTION,
        vec![
            ("custom_transfer_function_flag", Value::Bool(false)),
            ("index", Value::from(0u8)),
        ],
    );

    insert(
        &mut table,
        &AUXILIARY_DATA,
        vec![("padding", empty_bits()), ("bytes", Value::Bytes(Vec::new()))],
    );

    insert(
        &mut table,
        &PADDING,
        vec![("padding", empty_bits()), ("bytes", Value::Bytes(Vec::new()))],
    );

    insert(
        &mut table,
        &PICTURE_PARSE,
        vec![("padding1", empty_bits()), ("padding2", empty_bits())],
    );

    insert(
        &mut table,
        &PICTURE_HEADER,
        vec![("picture_number", Value::from(0u8))],
    );

    insert(&mut table, &WAVELET_TRANSFORM, vec![("padding", empty_bits())]);

    insert(
        &mut table,
        &TRANSFORM_PARAMETERS,
        vec![
            ("wavelet_index", Value::from(4u8)),
            ("dwt_depth", Value::from(0u8)),
        ],
    );

    insert(
        &mut table,
        &EXTENDED_TRANSFORM_PARAMETERS,
        vec![
            ("asym_transform_index_flag", Value::Bool(false)),
            ("wavelet_index_ho", Value::from(4u8)),
            ("asym_transform_flag", Value::Bool(false)),
            ("dwt_depth_ho", Value::from(0u8)),
        ],
    );

    insert(
        &mut table,
        &SLICE_PARAMETERS,
        vec![
            ("slices_x", Value::from(1u8)),
            ("slices_y", Value::from(1u8)),
            ("slice_bytes_numerator", Value::from(1u8)),
            ("slice_bytes_denominator", Value::from(1u8)),
            ("slice_prefix_bytes", Value::from(0u8)),
            ("slice_size_scaler", Value::from(1u8)),
        ],
    );

    insert(
        &mut table,
        &QUANT_MATRIX,
        vec![
            ("custom_quant_matrix", Value::Bool(false)),
            ("quant_matrix", Value::from(0u8)),
        ],
    );

    insert(
        &mut table,
        &FRAGMENT_PARSE,
        vec![("padding1", empty_bits()), ("padding2", empty_bits())],
    );

    insert(
        &mut table,
        &FRAGMENT_HEADER,
        vec![
            ("picture_number", Value::from(0u8)),
            ("fragment_data_length", Value::from(0u8)),
            ("fragment_slice_count", Value::from(0u8)),
            ("fragment_x_offset", Value::from(0u8)),
            ("fragment_y_offset", Value::from(0u8)),
        ],
    );

    insert(
        &mut table,
        &LD_SLICE_ARRAY,
        vec![
            ("qindex", Value::from(0u8)),
            ("slice_y_length", Value::from(0u8)),
            ("y_transform", Value::from(0u8)),
            ("y_block_padding", empty_bits()),
            ("c_transform", Value::from(0u8)),
            ("c_block_padding", empty_bits()),
        ],
    );

    insert(
        &mut table,
        &HQ_SLICE_ARRAY,
        vec![
            ("prefix_bytes", Value::Bytes(Vec::new())),
            ("qindex", Value::from(0u8)),
            ("slice_y_length", Value::from(0u8)),
            ("slice_c1_length", Value::from(0u8)),
            ("slice_c2_length", Value::from(0u8)),
            ("y_transform", Value::from(0u8)),
            ("c1_transform", Value::from(0u8)),
            ("c2_transform", Value::from(0u8)),
            ("y_block_padding", empty_bits()),
            ("c1_block_padding", empty_bits()),
            ("c2_block_padding", empty_bits()),
        ],
    );

    table
}

/// Like [`default_values`], but with [`Value::Auto`] as the default for
/// every field the auto-fill passes can compute: picture numbers, the
/// major version, and next/previous parse offsets. Used by
/// [`autofill_and_serialise_stream`](crate::autofill::autofill_and_serialise_stream).
pub fn default_values_with_auto() -> DefaultValues {
    let mut table = default_values();
    let set = |table: &mut DefaultValues, type_name: &'static str, key: &'static str| {
        if let Some(defaults) = table.get_mut(type_name) {
            defaults.insert(key, Value::Auto);
        }
    };
    set(&mut table, "ParseInfo", "next_parse_offset");
    set(&mut table, "ParseInfo", "previous_parse_offset");
    set(&mut table, "ParseParameters", "major_version");
    set(&mut table, "PictureHeader", "picture_number");
    set(&mut table, "FragmentHeader", "picture_number");
    table
}
