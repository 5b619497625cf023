//! Picture (12) and fragment (14) syntax: headers and transform
//! parameters. The slice data itself is handled in
//! [`crate::syntax::slices`].

use crate::error::Result;
use crate::records;
use crate::serdes::SerDes;
use crate::state::{to_u64, State};
use crate::syntax::slices::{fragment_data, transform_data};

/// (12.1) Parse a picture data unit.
pub fn picture_parse<S: SerDes>(serdes: &mut S, state: &mut State) -> Result<()> {
    serdes.set_context_type(&records::PICTURE_PARSE)?;
    serdes.byte_align("padding1")?;
    serdes.subcontext("picture_header", |serdes| picture_header(serdes, state))?;
    serdes.byte_align("padding2")?;
    serdes.subcontext("wavelet_transform", |serdes| {
        wavelet_transform(serdes, state)
    })?;
    Ok(())
}

/// (12.2) Parse a picture header.
pub fn picture_header<S: SerDes>(serdes: &mut S, state: &mut State) -> Result<()> {
    serdes.set_context_type(&records::PICTURE_HEADER)?;
    state.picture_number = to_u64(&serdes.uint_lit("picture_number", 4)?);
    Ok(())
}

/// (12.3) Parse the wavelet transform parameters and coefficient data.
pub fn wavelet_transform<S: SerDes>(serdes: &mut S, state: &mut State) -> Result<()> {
    serdes.set_context_type(&records::WAVELET_TRANSFORM)?;
    serdes.subcontext("transform_parameters", |serdes| {
        transform_parameters(serdes, state)
    })?;
    serdes.byte_align("padding")?;
    transform_data(serdes, state)?;
    Ok(())
}

/// (12.4.1) Parse the transform parameters.
pub fn transform_parameters<S: SerDes>(serdes: &mut S, state: &mut State) -> Result<()> {
    serdes.set_context_type(&records::TRANSFORM_PARAMETERS)?;
    state.wavelet_index = to_u64(&serdes.uint("wavelet_index")?);
    state.dwt_depth = to_u64(&serdes.uint("dwt_depth")?);

    state.wavelet_index_ho = state.wavelet_index;
    state.dwt_depth_ho = 0;
    if state.major_version >= 3 {
        serdes.subcontext("extended_transform_parameters", |serdes| {
            extended_transform_parameters(serdes, state)
        })?;
    }

    serdes.subcontext("slice_parameters", |serdes| {
        slice_parameters(serdes, state)
    })?;
    serdes.subcontext("quant_matrix", |serdes| quant_matrix(serdes, state))?;
    Ok(())
}

/// (12.4.4.1) Parse the horizontal-only transform parameters.
pub fn extended_transform_parameters<S: SerDes>(
    serdes: &mut S,
    state: &mut State,
) -> Result<()> {
    serdes.set_context_type(&records::EXTENDED_TRANSFORM_PARAMETERS)?;
    if serdes.bool("asym_transform_index_flag")? {
        state.wavelet_index_ho = to_u64(&serdes.uint("wavelet_index_ho")?);
    }
    if serdes.bool("asym_transform_flag")? {
        state.dwt_depth_ho = to_u64(&serdes.uint("dwt_depth_ho")?);
    }
    Ok(())
}

/// (12.4.5.2) Parse the slice parameters.
pub fn slice_parameters<S: SerDes>(serdes: &mut S, state: &mut State) -> Result<()> {
    serdes.set_context_type(&records::SLICE_PARAMETERS)?;
    state.slices_x = to_u64(&serdes.uint("slices_x")?);
    state.slices_y = to_u64(&serdes.uint("slices_y")?);

    let parse_code = state.parse_code;
    if parse_code.is_ld_picture() || parse_code.is_ld_fragment() {
        state.slice_bytes_numerator = to_u64(&serdes.uint("slice_bytes_numerator")?);
        state.slice_bytes_denominator = to_u64(&serdes.uint("slice_bytes_denominator")?);
    }
    if parse_code.is_hq_picture() || parse_code.is_hq_fragment() {
        state.slice_prefix_bytes = to_u64(&serdes.uint("slice_prefix_bytes")?);
        state.slice_size_scaler = to_u64(&serdes.uint("slice_size_scaler")?);
    }
    Ok(())
}

/// (12.4.5.3) Parse the custom quantisation matrix, one value per subband
/// in bitstream order.
pub fn quant_matrix<S: SerDes>(serdes: &mut S, state: &mut State) -> Result<()> {
    serdes.set_context_type(&records::QUANT_MATRIX)?;
    if serdes.bool("custom_quant_matrix")? {
        serdes.declare_list("quant_matrix")?;

        if state.dwt_depth_ho == 0 {
            serdes.uint("quant_matrix")?; // LL
        } else {
            serdes.uint("quant_matrix")?; // L
            for _level in 1..=state.dwt_depth_ho {
                serdes.uint("quant_matrix")?; // H
            }
        }
        for _level in state.dwt_depth_ho + 1..=state.dwt_depth_ho + state.dwt_depth {
            serdes.uint("quant_matrix")?; // HL
            serdes.uint("quant_matrix")?; // LH
            serdes.uint("quant_matrix")?; // HH
        }
    }
    Ok(())
}

/// (14.1) Parse a fragment data unit: the first fragment of a picture
/// carries transform parameters, subsequent fragments carry slice data.
pub fn fragment_parse<S: SerDes>(serdes: &mut S, state: &mut State) -> Result<()> {
    serdes.set_context_type(&records::FRAGMENT_PARSE)?;
    serdes.byte_align("padding1")?;
    serdes.subcontext("fragment_header", |serdes| fragment_header(serdes, state))?;
    if state.fragment_slice_count == 0 {
        serdes.byte_align("padding2")?;
        serdes.subcontext("transform_parameters", |serdes| {
            transform_parameters(serdes, state)
        })?;
    } else {
        serdes.byte_align("padding2")?;
        fragment_data(serdes, state)?;
    }
    Ok(())
}

/// (14.2) Parse a fragment header.
pub fn fragment_header<S: SerDes>(serdes: &mut S, state: &mut State) -> Result<()> {
    serdes.set_context_type(&records::FRAGMENT_HEADER)?;
    state.picture_number = to_u64(&serdes.uint_lit("picture_number", 4)?);
    state.fragment_data_length = to_u64(&serdes.uint_lit("fragment_data_length", 2)?);
    state.fragment_slice_count = to_u64(&serdes.uint_lit("fragment_slice_count", 2)?);
    if state.fragment_slice_count != 0 {
        state.fragment_x_offset = to_u64(&serdes.uint_lit("fragment_x_offset", 2)?);
        state.fragment_y_offset = to_u64(&serdes.uint_lit("fragment_y_offset", 2)?);
    }
    Ok(())
}
