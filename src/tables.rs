//! Constants and tables from the VC-2 specification (SMPTE ST 2042-1).

use crate::fixeddict::EnumTable;

/// The four-byte prefix beginning every parse_info header (10.5.1):
/// ASCII `BBCD`.
pub const PARSE_INFO_PREFIX: u32 = 0x4242_4344;

/// The size of a parse_info header in bytes (10.5.1).
pub const PARSE_INFO_HEADER_BYTES: u64 = 13;

/// Low-delay profile number (C.2).
pub const PROFILE_LOW_DELAY: u64 = 0;

/// High-quality profile number (C.2).
pub const PROFILE_HIGH_QUALITY: u64 = 3;

/// A parse code value from a parse_info header (Table 10.1).
///
/// Kept as a raw byte, since conformance tooling must be able to carry
/// codes not defined by the specification; the classification methods
/// below follow the bit-mask tests of (Table 10.2).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseCode(pub u8);

impl ParseCode {
    pub const SEQUENCE_HEADER: ParseCode = ParseCode(0x00);
    pub const END_OF_SEQUENCE: ParseCode = ParseCode(0x10);
    pub const AUXILIARY_DATA: ParseCode = ParseCode(0x20);
    pub const PADDING_DATA: ParseCode = ParseCode(0x30);
    pub const LOW_DELAY_PICTURE: ParseCode = ParseCode(0xC8);
    pub const HIGH_QUALITY_PICTURE: ParseCode = ParseCode(0xE8);
    pub const LOW_DELAY_PICTURE_FRAGMENT: ParseCode = ParseCode(0xCC);
    pub const HIGH_QUALITY_PICTURE_FRAGMENT: ParseCode = ParseCode(0xEC);

    pub fn is_seq_header(self) -> bool {
        self.0 == 0x00
    }

    pub fn is_end_of_sequence(self) -> bool {
        self.0 == 0x10
    }

    pub fn is_auxiliary_data(self) -> bool {
        self.0 & 0xF8 == 0x20
    }

    pub fn is_padding_data(self) -> bool {
        self.0 == 0x30
    }

    pub fn is_picture(self) -> bool {
        self.0 & 0x8C == 0x88
    }

    pub fn is_ld_picture(self) -> bool {
        self.0 & 0xFC == 0xC8
    }

    pub fn is_hq_picture(self) -> bool {
        self.0 & 0xFC == 0xE8
    }

    pub fn is_fragment(self) -> bool {
        self.0 & 0x0C == 0x0C
    }

    pub fn is_ld_fragment(self) -> bool {
        self.0 & 0xFC == 0xCC
    }

    pub fn is_hq_fragment(self) -> bool {
        self.0 & 0xFC == 0xEC
    }

    pub fn using_dc_prediction(self) -> bool {
        self.0 & 0x28 == 0x08
    }
}

pub const PARSE_CODES: EnumTable = &[
    (0x00, "sequence_header"),
    (0x10, "end_of_sequence"),
    (0x20, "auxiliary_data"),
    (0x30, "padding_data"),
    (0xC8, "low_delay_picture"),
    (0xCC, "low_delay_picture_fragment"),
    (0xE8, "high_quality_picture"),
    (0xEC, "high_quality_picture_fragment"),
];

pub const PROFILES: EnumTable = &[(0, "low_delay"), (3, "high_quality")];

pub const LEVELS: EnumTable = &[(0, "unconstrained")];

pub const PICTURE_CODING_MODES: EnumTable =
    &[(0, "pictures_are_frames"), (1, "pictures_are_fields")];

pub const COLOR_DIFF_SAMPLING_FORMATS: EnumTable =
    &[(0, "color_4_4_4"), (1, "color_4_2_2"), (2, "color_4_2_0")];

pub const SOURCE_SAMPLING_MODES: EnumTable = &[(0, "progressive"), (1, "interlaced")];

pub const WAVELET_FILTERS: EnumTable = &[
    (0, "deslauriers_dubuc_9_7"),
    (1, "le_gall_5_3"),
    (2, "deslauriers_dubuc_13_7"),
    (3, "haar_no_shift"),
    (4, "haar_with_shift"),
    (5, "fidelity"),
    (6, "daubechies_9_7"),
];

pub const BASE_VIDEO_FORMATS: EnumTable = &[
    (0, "custom_format"),
    (1, "qsif525"),
    (2, "qcif"),
    (3, "sif525"),
    (4, "cif"),
    (5, "_4sif525"),
    (6, "_4cif"),
    (7, "sd480i_60"),
    (8, "sd576i_50"),
    (9, "hd720p_60"),
    (10, "hd720p_50"),
    (11, "hd1080i_60"),
    (12, "hd1080i_50"),
    (13, "hd1080p_60"),
    (14, "hd1080p_50"),
    (15, "dc2k_24"),
    (16, "dc4k_24"),
    (17, "uhdtv_4k_60"),
    (18, "uhdtv_4k_50"),
    (19, "uhdtv_8k_60"),
    (20, "uhdtv_8k_50"),
    (21, "hd1080p_24"),
    (22, "sd_pro486"),
];

pub const PRESET_FRAME_RATES: EnumTable = &[
    (1, "fps_24_over_1_001"),
    (2, "fps_24"),
    (3, "fps_25"),
    (4, "fps_30_over_1_001"),
    (5, "fps_30"),
    (6, "fps_50"),
    (7, "fps_60_over_1_001"),
    (8, "fps_60"),
    (9, "fps_15_over_1_001"),
    (10, "fps_12_5"),
    (11, "fps_48"),
    (12, "fps_48_over_1_001"),
    (13, "fps_96"),
    (14, "fps_100"),
    (15, "fps_120_over_1_001"),
    (16, "fps_120"),
];

pub const PRESET_PIXEL_ASPECT_RATIOS: EnumTable = &[
    (1, "ratio_1_1"),
    (2, "ratio_10_11"),
    (3, "ratio_12_11"),
    (4, "ratio_40_33"),
    (5, "ratio_16_11"),
    (6, "ratio_4_3"),
];

pub const PRESET_SIGNAL_RANGES: EnumTable = &[
    (1, "range_8_bit_full_range"),
    (2, "range_8_bit_video"),
    (3, "range_10_bit_video"),
    (4, "range_12_bit_video"),
    (5, "range_10_bit_full_range"),
    (6, "range_12_bit_full_range"),
    (7, "range_16_bit_video"),
    (8, "range_16_bit_full_range"),
];

pub const PRESET_COLOR_SPECS: EnumTable = &[
    (0, "custom"),
    (1, "sdtv_525"),
    (2, "sdtv_625"),
    (3, "hdtv"),
    (4, "d_cinema"),
    (5, "uhdtv"),
    (6, "hdr_tv_pq"),
    (7, "hdr_tv_hlg"),
];

pub const PRESET_COLOR_PRIMARIES: EnumTable = &[
    (0, "hdtv"),
    (1, "sdtv_525"),
    (2, "sdtv_625"),
    (3, "d_cinema"),
    (4, "uhdtv"),
];

pub const PRESET_COLOR_MATRICES: EnumTable = &[
    (0, "hdtv"),
    (1, "sdtv"),
    (2, "reversible"),
    (3, "rgb"),
    (4, "uhdtv"),
];

pub const PRESET_TRANSFER_FUNCTIONS: EnumTable = &[
    (0, "tv_gamma"),
    (1, "extended_gamut"),
    (2, "linear"),
    (3, "d_cinema"),
    (4, "perceptual_quantizer"),
    (5, "hybrid_log_gamma"),
];

/// Preset frame rate as a `(numerator, denominator)` pair (Table 11.3).
pub fn preset_frame_rate(index: u64) -> Option<(u64, u64)> {
    Some(match index {
        1 => (24000, 1001),
        2 => (24, 1),
        3 => (25, 1),
        4 => (30000, 1001),
        5 => (30, 1),
        6 => (50, 1),
        7 => (60000, 1001),
        8 => (60, 1),
        9 => (15000, 1001),
        10 => (25, 2),
        11 => (48, 1),
        12 => (48000, 1001),
        13 => (96, 1),
        14 => (100, 1),
        15 => (120000, 1001),
        16 => (120, 1),
        _ => return None,
    })
}

/// Preset pixel aspect ratio as a `(numerator, denominator)` pair
/// (Table 11.4).
pub fn preset_pixel_aspect_ratio(index: u64) -> Option<(u64, u64)> {
    Some(match index {
        1 => (1, 1),
        2 => (10, 11),
        3 => (12, 11),
        4 => (40, 33),
        5 => (16, 11),
        6 => (4, 3),
        _ => return None,
    })
}

/// Signal offset/excursion parameters for one preset signal range
/// (Table 11.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalRangeParameters {
    pub luma_offset: u64,
    pub luma_excursion: u64,
    pub color_diff_offset: u64,
    pub color_diff_excursion: u64,
}

pub fn preset_signal_range(index: u64) -> Option<SignalRangeParameters> {
    let (luma_offset, luma_excursion, color_diff_offset, color_diff_excursion) = match index {
        1 => (0, 255, 128, 255),
        2 => (16, 219, 128, 224),
        3 => (64, 876, 512, 896),
        4 => (256, 3504, 2048, 3584),
        5 => (0, 1023, 512, 1023),
        6 => (0, 4095, 2048, 4095),
        7 => (4096, 56064, 32768, 57344),
        8 => (0, 65535, 32768, 65535),
        _ => return None,
    };
    Some(SignalRangeParameters {
        luma_offset,
        luma_excursion,
        color_diff_offset,
        color_diff_excursion,
    })
}

/// Preset colour specification as `(primaries, matrix, transfer function)`
/// preset indices (Table 11.6).
pub fn preset_color_spec(index: u64) -> Option<(u64, u64, u64)> {
    Some(match index {
        0 => (0, 0, 0),
        1 => (1, 1, 0),
        2 => (2, 1, 0),
        3 => (0, 0, 0),
        4 => (3, 3, 3),
        5 => (4, 4, 0),
        6 => (4, 4, 4),
        7 => (4, 4, 5),
        _ => return None,
    })
}

/// One row of the base video format table (Table 11.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseVideoFormatParameters {
    pub frame_width: u64,
    pub frame_height: u64,
    pub color_diff_format_index: u64,
    pub source_sampling: u64,
    pub top_field_first: bool,
    pub frame_rate_index: u64,
    pub pixel_aspect_ratio_index: u64,
    pub clean_width: u64,
    pub clean_height: u64,
    pub left_offset: u64,
    pub top_offset: u64,
    pub signal_range_index: u64,
    pub color_spec_index: u64,
}

macro_rules! base_format {
    ($w:expr, $h:expr, $cdf:expr, $ss:expr, $tff:expr, $fr:expr, $par:expr,
     $cw:expr, $ch:expr, $lo:expr, $to:expr, $sr:expr, $cs:expr) => {
        BaseVideoFormatParameters {
            frame_width: $w,
            frame_height: $h,
            color_diff_format_index: $cdf,
            source_sampling: $ss,
            top_field_first: $tff,
            frame_rate_index: $fr,
            pixel_aspect_ratio_index: $par,
            clean_width: $cw,
            clean_height: $ch,
            left_offset: $lo,
            top_offset: $to,
            signal_range_index: $sr,
            color_spec_index: $cs,
        }
    };
}

/// (Table 11.1) Indexed by base video format number, 0 (custom) to 22.
static BASE_VIDEO_FORMAT_PARAMETERS: [BaseVideoFormatParameters; 23] = [
    // custom_format
    base_format!(640, 480, 2, 0, false, 1, 1, 640, 480, 0, 0, 1, 0),
    // qsif525
    base_format!(176, 120, 2, 0, false, 9, 2, 176, 120, 0, 0, 1, 1),
    // qcif
    base_format!(176, 144, 2, 0, true, 10, 3, 176, 144, 0, 0, 1, 2),
    // sif525
    base_format!(352, 240, 2, 0, false, 9, 2, 352, 240, 0, 0, 1, 1),
    // cif
    base_format!(352, 288, 2, 0, true, 10, 3, 352, 288, 0, 0, 1, 2),
    // 4sif525
    base_format!(704, 480, 2, 0, false, 9, 2, 704, 480, 0, 0, 1, 1),
    // 4cif
    base_format!(704, 576, 2, 0, true, 10, 3, 704, 576, 0, 0, 1, 2),
    // sd480i_60
    base_format!(720, 480, 1, 1, false, 4, 2, 704, 480, 8, 0, 3, 1),
    // sd576i_50
    base_format!(720, 576, 1, 1, true, 3, 3, 704, 576, 8, 0, 3, 2),
    // hd720p_60
    base_format!(1280, 720, 1, 0, true, 7, 1, 1280, 720, 0, 0, 3, 3),
    // hd720p_50
    base_format!(1280, 720, 1, 0, true, 6, 1, 1280, 720, 0, 0, 3, 3),
    // hd1080i_60
    base_format!(1920, 1080, 1, 1, true, 4, 1, 1920, 1080, 0, 0, 3, 3),
    // hd1080i_50
    base_format!(1920, 1080, 1, 1, true, 3, 1, 1920, 1080, 0, 0, 3, 3),
    // hd1080p_60
    base_format!(1920, 1080, 1, 0, true, 7, 1, 1920, 1080, 0, 0, 3, 3),
    // hd1080p_50
    base_format!(1920, 1080, 1, 0, true, 6, 1, 1920, 1080, 0, 0, 3, 3),
    // dc2k_24
    base_format!(2048, 1080, 0, 0, true, 2, 1, 2048, 1080, 0, 0, 4, 4),
    // dc4k_24
    base_format!(4096, 2160, 0, 0, true, 2, 1, 4096, 2160, 0, 0, 4, 4),
    // uhdtv_4k_60
    base_format!(3840, 2160, 1, 0, true, 7, 1, 3840, 2160, 0, 0, 3, 5),
    // uhdtv_4k_50
    base_format!(3840, 2160, 1, 0, true, 6, 1, 3840, 2160, 0, 0, 3, 5),
    // uhdtv_8k_60
    base_format!(7680, 4320, 1, 0, true, 7, 1, 7680, 4320, 0, 0, 3, 5),
    // uhdtv_8k_50
    base_format!(7680, 4320, 1, 0, true, 6, 1, 7680, 4320, 0, 0, 3, 5),
    // hd1080p_24
    base_format!(1920, 1080, 1, 0, true, 1, 1, 1920, 1080, 0, 0, 3, 3),
    // sd_pro486
    base_format!(720, 486, 1, 1, false, 4, 2, 720, 486, 0, 0, 3, 1),
];

pub fn base_video_format_parameters(index: u64) -> Option<&'static BaseVideoFormatParameters> {
    BASE_VIDEO_FORMAT_PARAMETERS.get(index as usize)
}
