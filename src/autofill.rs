//! Auto-fill passes for computed bitstream fields.
//!
//! Some fields cannot be given a fixed default: picture numbers count
//! upwards, the major version depends on which features a sequence uses,
//! and parse offsets depend on the byte layout of the serialised stream.
//! Setting such a field to [`Value::Auto`] (or leaving it absent, with the
//! [`default_values_with_auto`](crate::records::default_values_with_auto)
//! table in use) asks the passes in this module to compute it.
//!
//! [`autofill_and_serialise_stream`] is the common entry point: it runs
//! every pass, serialises, then patches the parse offsets which are only
//! knowable after serialisation.

use std::io::{Seek, Write};

use log::debug;
use num_bigint::BigInt;

use crate::error::{Error, Result};
use crate::fixeddict::{Record, RecordSchema, Value};
use crate::io::BitstreamWriter;
use crate::records;
use crate::serdes::Serialiser;
use crate::syntax::parse_stream;
use crate::tables::{ParseCode, PARSE_INFO_HEADER_BYTES, PROFILE_HIGH_QUALITY};

/// The lowest major version any stream may carry.
const MINIMUM_MAJOR_VERSION: u64 = 1;

/// (11.2.2) The major version required by a parse code: fragments demand
/// version 3, high-quality pictures version 2.
fn parse_code_version_implication(parse_code: u64) -> u64 {
    let parse_code = ParseCode(parse_code as u8);
    if parse_code.is_fragment() {
        3
    } else if parse_code.is_hq_picture() {
        2
    } else {
        MINIMUM_MAJOR_VERSION
    }
}

fn profile_version_implication(profile: u64) -> u64 {
    if profile == PROFILE_HIGH_QUALITY {
        2
    } else {
        MINIMUM_MAJOR_VERSION
    }
}

/// Preset frame rates 48/1.001 fps and above were added in version 3.
fn preset_frame_rate_version_implication(index: u64) -> u64 {
    if index >= 12 {
        3
    } else {
        MINIMUM_MAJOR_VERSION
    }
}

/// The full-range and 16-bit signal ranges were added in version 3.
fn preset_signal_range_version_implication(index: u64) -> u64 {
    if index >= 5 {
        3
    } else {
        MINIMUM_MAJOR_VERSION
    }
}

/// The UHDTV and HDR colour specifications were added in version 3.
fn preset_color_spec_version_implication(index: u64) -> u64 {
    if index >= 5 {
        3
    } else {
        MINIMUM_MAJOR_VERSION
    }
}

fn preset_color_primaries_version_implication(index: u64) -> u64 {
    if index >= 4 {
        3
    } else {
        MINIMUM_MAJOR_VERSION
    }
}

fn preset_color_matrix_version_implication(index: u64) -> u64 {
    if index >= 4 {
        3
    } else {
        MINIMUM_MAJOR_VERSION
    }
}

fn preset_transfer_function_version_implication(index: u64) -> u64 {
    if index >= 4 {
        3
    } else {
        MINIMUM_MAJOR_VERSION
    }
}

/// Asymmetric transforms require the extended transform parameters, added
/// in version 3.
fn wavelet_transform_version_implication(
    wavelet_index: u64,
    wavelet_index_ho: u64,
    dwt_depth_ho: u64,
) -> u64 {
    if wavelet_index != wavelet_index_ho || dwt_depth_ho != 0 {
        3
    } else {
        MINIMUM_MAJOR_VERSION
    }
}

/// Ensure `record[key]` is a record (creating an empty one of the given
/// type if absent) and return it mutably.
fn setdefault_record<'a>(
    record: &'a mut Record,
    key: &'static str,
    schema: &'static RecordSchema,
) -> Result<&'a mut Record> {
    if !matches!(record.get(key), Some(Value::Record(_))) {
        record.insert(key, Record::new(schema))?;
    }
    record
        .get_mut(key)
        .and_then(Value::as_record_mut)
        .ok_or_else(|| Error::MissingTarget(key.to_string()))
}

/// Fetch a value from `record`, falling back on the auto-enabled default
/// table for its type.
fn get_auto(record: &Record, type_name: &str, key: &str) -> Option<Value> {
    record.get(key).cloned().or_else(|| {
        records::default_values_with_auto()
            .get(type_name)
            .and_then(|defaults| defaults.get(key))
            .cloned()
    })
}

fn parse_code_of(data_unit: &Record) -> Option<u64> {
    data_unit
        .get("parse_info")
        .and_then(Value::as_record)
        .and_then(|parse_info| get_auto(parse_info, "ParseInfo", "parse_code"))
        .and_then(|value| value.as_u64())
}

/// If the data unit is a picture, or the first fragment of a fragmented
/// picture, return its transform parameters (creating empty records on the
/// way if necessary). Otherwise `None`.
fn get_transform_parameters<'a>(data_unit: &'a mut Record) -> Result<Option<&'a mut Record>> {
    let parse_code = ParseCode(parse_code_of(data_unit).unwrap_or(0x10) as u8);
    if parse_code.is_picture() {
        let picture_parse = setdefault_record(data_unit, "picture_parse", &records::PICTURE_PARSE)?;
        let wavelet_transform = setdefault_record(
            picture_parse,
            "wavelet_transform",
            &records::WAVELET_TRANSFORM,
        )?;
        Ok(Some(setdefault_record(
            wavelet_transform,
            "transform_parameters",
            &records::TRANSFORM_PARAMETERS,
        )?))
    } else if parse_code.is_fragment() {
        let fragment_slice_count = data_unit
            .get("fragment_parse")
            .and_then(Value::as_record)
            .and_then(|fragment_parse| fragment_parse.get("fragment_header"))
            .and_then(Value::as_record)
            .and_then(|header| get_auto(header, "FragmentHeader", "fragment_slice_count"))
            .and_then(|value| value.as_u64())
            .unwrap_or(0);
        if fragment_slice_count == 0 {
            let fragment_parse =
                setdefault_record(data_unit, "fragment_parse", &records::FRAGMENT_PARSE)?;
            Ok(Some(setdefault_record(
                fragment_parse,
                "transform_parameters",
                &records::TRANSFORM_PARAMETERS,
            )?))
        } else {
            Ok(None)
        }
    } else {
        Ok(None)
    }
}

fn sequences_mut(stream: &mut Record) -> Option<&mut Vec<Value>> {
    stream.get_mut("sequences").and_then(Value::as_list_mut)
}

fn data_units_mut(sequence: &mut Value) -> Option<&mut Vec<Value>> {
    sequence
        .as_record_mut()?
        .get_mut("data_units")
        .and_then(Value::as_list_mut)
}

/// Fill in every absent or [`Value::Auto`] picture-number field with
/// consecutive picture numbers, modulo 2^32. Numbering restarts for each
/// sequence; explicit values are preserved and restart the count;
/// non-first fragments repeat their picture's number.
pub fn autofill_picture_number(stream: &mut Record, initial_picture_number: u32) -> Result<()> {
    let sequences = match sequences_mut(stream) {
        Some(sequences) => sequences,
        None => return Ok(()),
    };
    for sequence in sequences.iter_mut() {
        let mut last_picture_number = initial_picture_number.wrapping_sub(1);

        let data_units = match data_units_mut(sequence) {
            Some(data_units) => data_units,
            None => continue,
        };
        for data_unit in data_units.iter_mut() {
            let data_unit = match data_unit.as_record_mut() {
                Some(data_unit) => data_unit,
                None => continue,
            };
            let parse_code = data_unit
                .get("parse_info")
                .and_then(Value::as_record)
                .and_then(|parse_info| parse_info.get("parse_code"))
                .and_then(Value::as_u64);

            // Find the picture or fragment header holding the picture
            // number, and whether this data unit starts a new picture.
            let (header, increment) = match parse_code {
                Some(0xC8) | Some(0xE8) => {
                    let picture_parse =
                        setdefault_record(data_unit, "picture_parse", &records::PICTURE_PARSE)?;
                    let header = setdefault_record(
                        picture_parse,
                        "picture_header",
                        &records::PICTURE_HEADER,
                    )?;
                    (header, true)
                }
                Some(0xCC) | Some(0xEC) => {
                    let fragment_parse =
                        setdefault_record(data_unit, "fragment_parse", &records::FRAGMENT_PARSE)?;
                    let header = setdefault_record(
                        fragment_parse,
                        "fragment_header",
                        &records::FRAGMENT_HEADER,
                    )?;
                    let increment = header
                        .get("fragment_slice_count")
                        .and_then(Value::as_u64)
                        .unwrap_or(0)
                        == 0;
                    (header, increment)
                }
                _ => continue,
            };

            if header.get("picture_number").map_or(true, Value::is_auto) {
                let picture_number = if increment {
                    last_picture_number.wrapping_add(1)
                } else {
                    last_picture_number
                };
                header.insert("picture_number", Value::from(picture_number))?;
            }
            last_picture_number = header
                .get("picture_number")
                .and_then(Value::as_u64)
                .unwrap_or(0) as u32;
        }
    }
    Ok(())
}

fn bool_of(value: Option<Value>) -> bool {
    value.and_then(|v| v.as_bool()).unwrap_or(false)
}

fn u64_of(value: Option<Value>) -> u64 {
    value.and_then(|v| v.as_u64()).unwrap_or(0)
}

/// Compute the version implications of one sequence header.
fn sequence_header_version_implication(sequence_header: &Record) -> u64 {
    let mut major_version = MINIMUM_MAJOR_VERSION;

    let empty = Record::untyped();
    let parse_parameters = sequence_header
        .get("parse_parameters")
        .and_then(Value::as_record)
        .unwrap_or(&empty);
    let profile = u64_of(get_auto(parse_parameters, "ParseParameters", "profile"));
    major_version = major_version.max(profile_version_implication(profile));

    let source_parameters = sequence_header
        .get("video_parameters")
        .and_then(Value::as_record)
        .unwrap_or(&empty);

    let frame_rate = source_parameters
        .get("frame_rate")
        .and_then(Value::as_record)
        .unwrap_or(&empty);
    if bool_of(get_auto(frame_rate, "FrameRate", "custom_frame_rate_flag")) {
        let index = u64_of(get_auto(frame_rate, "FrameRate", "index"));
        major_version = major_version.max(preset_frame_rate_version_implication(index));
    }

    let signal_range = source_parameters
        .get("signal_range")
        .and_then(Value::as_record)
        .unwrap_or(&empty);
    if bool_of(get_auto(signal_range, "SignalRange", "custom_signal_range_flag")) {
        let index = u64_of(get_auto(signal_range, "SignalRange", "index"));
        major_version = major_version.max(preset_signal_range_version_implication(index));
    }

    let color_spec = source_parameters
        .get("color_spec")
        .and_then(Value::as_record)
        .unwrap_or(&empty);
    if bool_of(get_auto(color_spec, "ColorSpec", "custom_color_spec_flag")) {
        let index = u64_of(get_auto(color_spec, "ColorSpec", "index"));
        major_version = major_version.max(preset_color_spec_version_implication(index));

        if index == 0 {
            let color_primaries = color_spec
                .get("color_primaries")
                .and_then(Value::as_record)
                .unwrap_or(&empty);
            if bool_of(get_auto(
                color_primaries,
                "ColorPrimaries",
                "custom_color_primaries_flag",
            )) {
                let index = u64_of(get_auto(color_primaries, "ColorPrimaries", "index"));
                major_version =
                    major_version.max(preset_color_primaries_version_implication(index));
            }

            let color_matrix = color_spec
                .get("color_matrix")
                .and_then(Value::as_record)
                .unwrap_or(&empty);
            if bool_of(get_auto(
                color_matrix,
                "ColorMatrix",
                "custom_color_matrix_flag",
            )) {
                let index = u64_of(get_auto(color_matrix, "ColorMatrix", "index"));
                major_version = major_version.max(preset_color_matrix_version_implication(index));
            }

            let transfer_function = color_spec
                .get("transfer_function")
                .and_then(Value::as_record)
                .unwrap_or(&empty);
            if bool_of(get_auto(
                transfer_function,
                "TransferFunction",
                "custom_transfer_function_flag",
            )) {
                let index = u64_of(get_auto(transfer_function, "TransferFunction", "index"));
                major_version =
                    major_version.max(preset_transfer_function_version_implication(index));
            }
        }
    }

    major_version
}

/// Compute the version implications of one set of transform parameters.
fn transform_parameters_version_implication(transform_parameters: &Record) -> u64 {
    let empty = Record::untyped();
    let extended = transform_parameters
        .get("extended_transform_parameters")
        .and_then(Value::as_record)
        .unwrap_or(&empty);

    let wavelet_index = u64_of(get_auto(
        transform_parameters,
        "TransformParameters",
        "wavelet_index",
    ));

    let mut wavelet_index_ho = wavelet_index;
    if bool_of(get_auto(
        extended,
        "ExtendedTransformParameters",
        "asym_transform_index_flag",
    )) {
        wavelet_index_ho = u64_of(get_auto(
            extended,
            "ExtendedTransformParameters",
            "wavelet_index_ho",
        ));
    }

    let mut dwt_depth_ho = 0;
    if bool_of(get_auto(
        extended,
        "ExtendedTransformParameters",
        "asym_transform_flag",
    )) {
        dwt_depth_ho = u64_of(get_auto(
            extended,
            "ExtendedTransformParameters",
            "dwt_depth_ho",
        ));
    }

    wavelet_transform_version_implication(wavelet_index, wavelet_index_ho, dwt_depth_ho)
}

/// Set every [`Value::Auto`] (or absent) `major_version` field to the
/// lowest version supporting the features its sequence uses.
///
/// As a side effect, wherever `Auto` was used and the deduced version is
/// below 3 (i.e. the transform is symmetric with no horizontal-only
/// levels), any `extended_transform_parameters` records in the following
/// transform parameters are removed: version 1 and 2 streams have no such
/// field.
pub fn autofill_major_version(stream: &mut Record) -> Result<()> {
    let sequences = match sequences_mut(stream) {
        Some(sequences) => sequences,
        None => return Ok(()),
    };
    for sequence in sequences.iter_mut() {
        // First pass: the version required by every feature used in this
        // sequence.
        let mut major_version = MINIMUM_MAJOR_VERSION;
        let data_units = match data_units_mut(sequence) {
            Some(data_units) => data_units,
            None => continue,
        };
        for data_unit in data_units.iter_mut() {
            let data_unit = match data_unit.as_record_mut() {
                Some(data_unit) => data_unit,
                None => continue,
            };
            let parse_code = parse_code_of(data_unit).unwrap_or(0x10);
            major_version = major_version.max(parse_code_version_implication(parse_code));

            if parse_code == 0x00 {
                let empty = Record::untyped();
                let sequence_header = data_unit
                    .get("sequence_header")
                    .and_then(Value::as_record)
                    .unwrap_or(&empty);
                major_version =
                    major_version.max(sequence_header_version_implication(sequence_header));
            } else if let Some(transform_parameters) = get_transform_parameters(data_unit)? {
                major_version = major_version
                    .max(transform_parameters_version_implication(transform_parameters));
            }
        }

        debug!("deduced major_version {}", major_version);

        // Second pass: write the version into auto-valued sequence
        // headers and strip extended transform parameters where a
        // pre-version-3 stream cannot carry them. Explicit version values
        // leave both the version and any following transform parameters
        // untouched.
        let mut auto_used = false;
        for data_unit in data_units.iter_mut() {
            let data_unit = match data_unit.as_record_mut() {
                Some(data_unit) => data_unit,
                None => continue,
            };
            let parse_code = parse_code_of(data_unit).unwrap_or(0x10);
            if parse_code == 0x00 {
                let sequence_header =
                    setdefault_record(data_unit, "sequence_header", &records::SEQUENCE_HEADER)?;
                let parse_parameters = setdefault_record(
                    sequence_header,
                    "parse_parameters",
                    &records::PARSE_PARAMETERS,
                )?;
                if parse_parameters
                    .get("major_version")
                    .map_or(true, Value::is_auto)
                {
                    parse_parameters.insert("major_version", Value::from(major_version))?;
                    auto_used = true;
                } else {
                    auto_used = false;
                }
            } else if let Some(transform_parameters) = get_transform_parameters(data_unit)? {
                if auto_used && major_version < 3 {
                    transform_parameters.remove("extended_transform_parameters");
                }
            }
        }
    }
    Ok(())
}

/// Fill in every absent or [`Value::Auto`] next/previous parse offset.
///
/// Padding and auxiliary-data units have their `next_parse_offset`
/// computed directly from their payload length. All other auto-filled
/// offsets are set to a `0` placeholder here, and their
/// `(sequence, data unit)` positions returned for
/// [`autofill_parse_offsets_finalize`] to patch once the stream has been
/// serialised.
pub fn autofill_parse_offsets(
    stream: &mut Record,
) -> Result<(Vec<(usize, usize)>, Vec<(usize, usize)>)> {
    let mut next_parse_offsets_to_autofill = Vec::new();
    let mut previous_parse_offsets_to_autofill = Vec::new();

    let sequences = match sequences_mut(stream) {
        Some(sequences) => sequences,
        None => return Ok((next_parse_offsets_to_autofill, previous_parse_offsets_to_autofill)),
    };
    for (sequence_index, sequence) in sequences.iter_mut().enumerate() {
        let data_units = match data_units_mut(sequence) {
            Some(data_units) => data_units,
            None => continue,
        };
        for (data_unit_index, data_unit) in data_units.iter_mut().enumerate() {
            let data_unit = match data_unit.as_record_mut() {
                Some(data_unit) => data_unit,
                None => continue,
            };
            if !matches!(data_unit.get("parse_info"), Some(Value::Record(_))) {
                data_unit.insert("parse_info", Record::new(&records::PARSE_INFO))?;
            }

            let parse_code = ParseCode(parse_code_of(data_unit).unwrap_or(0x10) as u8);
            if parse_code.is_auxiliary_data() || parse_code.is_padding_data() {
                // The payload length of these units is determined by
                // next_parse_offset, so it is computed here rather than
                // after serialisation.
                let next_is_auto = data_unit
                    .get("parse_info")
                    .and_then(Value::as_record)
                    .and_then(|parse_info| parse_info.get("next_parse_offset"))
                    .map_or(true, Value::is_auto);
                if next_is_auto {
                    let payload_key = if parse_code.is_auxiliary_data() {
                        "auxiliary_data"
                    } else {
                        "padding"
                    };
                    let payload_length = data_unit
                        .get(payload_key)
                        .and_then(Value::as_record)
                        .and_then(|payload| payload.get("bytes"))
                        .and_then(Value::as_bytes)
                        .map_or(0, |bytes| bytes.len() as u64);
                    let parse_info =
                        setdefault_record(data_unit, "parse_info", &records::PARSE_INFO)?;
                    parse_info.insert(
                        "next_parse_offset",
                        Value::from(PARSE_INFO_HEADER_BYTES + payload_length),
                    )?;
                }
            }

            let parse_info = setdefault_record(data_unit, "parse_info", &records::PARSE_INFO)?;
            if parse_info
                .get("next_parse_offset")
                .map_or(true, Value::is_auto)
            {
                parse_info.insert("next_parse_offset", Value::from(0u8))?;
                next_parse_offsets_to_autofill.push((sequence_index, data_unit_index));
            }
            if parse_info
                .get("previous_parse_offset")
                .map_or(true, Value::is_auto)
            {
                parse_info.insert("previous_parse_offset", Value::from(0u8))?;
                previous_parse_offsets_to_autofill.push((sequence_index, data_unit_index));
            }
        }
    }

    Ok((next_parse_offsets_to_autofill, previous_parse_offsets_to_autofill))
}

fn data_unit_count(stream: &Record, sequence_index: usize) -> Result<usize> {
    stream
        .get("sequences")
        .and_then(Value::as_list)
        .and_then(|sequences| sequences.get(sequence_index))
        .and_then(Value::as_record)
        .and_then(|sequence| sequence.get("data_units"))
        .and_then(Value::as_list)
        .map(Vec::len)
        .ok_or_else(|| {
            Error::MissingTarget(format!("Stream['sequences'][{}]['data_units']", sequence_index))
        })
}

fn parse_info_offset(stream: &Record, sequence_index: usize, data_unit_index: usize) -> Result<u64> {
    stream
        .get("sequences")
        .and_then(Value::as_list)
        .and_then(|sequences| sequences.get(sequence_index))
        .and_then(Value::as_record)
        .and_then(|sequence| sequence.get("data_units"))
        .and_then(Value::as_list)
        .and_then(|data_units| data_units.get(data_unit_index))
        .and_then(Value::as_record)
        .and_then(|data_unit| data_unit.get("parse_info"))
        .and_then(Value::as_record)
        .and_then(|parse_info| parse_info.get("_offset"))
        .and_then(Value::as_u64)
        .ok_or_else(|| {
            Error::MissingTarget(format!(
                "Stream['sequences'][{}]['data_units'][{}]['parse_info']['_offset']",
                sequence_index, data_unit_index,
            ))
        })
}

/// Patch the placeholder parse offsets left by [`autofill_parse_offsets`]
/// directly into the serialised bitstream.
///
/// `stream` must be the tree returned by serialisation (it carries the
/// `_offset` computed values recorded as each parse_info was written), and
/// `writer` the bitstream writer that produced it. The first
/// previous-offset and last next-offset of each sequence are zero.
pub fn autofill_parse_offsets_finalize<W: Write + Seek>(
    writer: &mut BitstreamWriter<W>,
    stream: &Record,
    next_parse_offsets_to_autofill: &[(usize, usize)],
    previous_parse_offsets_to_autofill: &[(usize, usize)],
) -> Result<()> {
    let end_offset = writer.tell();

    for &(sequence_index, data_unit_index) in next_parse_offsets_to_autofill {
        let byte_offset = parse_info_offset(stream, sequence_index, data_unit_index)?;
        let next_parse_offset = if data_unit_index + 1 == data_unit_count(stream, sequence_index)? {
            0
        } else {
            parse_info_offset(stream, sequence_index, data_unit_index + 1)? - byte_offset
        };
        // Seek past the prefix and parse code.
        writer.seek(byte_offset + 4 + 1, 7)?;
        writer.write_uint_lit(4, &BigInt::from(next_parse_offset))?;
        writer.flush()?;
    }

    for &(sequence_index, data_unit_index) in previous_parse_offsets_to_autofill {
        let byte_offset = parse_info_offset(stream, sequence_index, data_unit_index)?;
        let previous_parse_offset = if data_unit_index == 0 {
            0
        } else {
            byte_offset - parse_info_offset(stream, sequence_index, data_unit_index - 1)?
        };
        // Seek past the prefix, parse code and next offset.
        writer.seek(byte_offset + 4 + 1 + 4, 7)?;
        writer.write_uint_lit(4, &BigInt::from(previous_parse_offset))?;
        writer.flush()?;
    }

    writer.seek(end_offset.0, end_offset.1)?;
    Ok(())
}

/// Auto-fill and serialise a stream tree in one step.
///
/// Picture numbers, the major version and parse offsets are filled in
/// (where requested with [`Value::Auto`] or left absent), the stream is
/// serialised with the auto-enabled default-value table, and the parse
/// offsets patched in place. On success, `stream` is replaced by the
/// serialised tree, including all computed values.
pub fn autofill_and_serialise_stream<W: Write + Seek>(
    file: W,
    stream: &mut Record,
) -> Result<()> {
    autofill_picture_number(stream, 0)?;
    autofill_major_version(stream)?;
    let (next_parse_offsets_to_autofill, previous_parse_offsets_to_autofill) =
        autofill_parse_offsets(stream)?;

    let writer = BitstreamWriter::new(file)?;
    let tree = std::mem::replace(stream, Record::untyped());
    let mut serialiser = Serialiser::new(writer, tree, records::default_values_with_auto());
    parse_stream(&mut serialiser)?;
    let (mut writer, tree) = serialiser.finish()?;
    writer.flush()?;

    autofill_parse_offsets_finalize(
        &mut writer,
        &tree,
        &next_parse_offsets_to_autofill,
        &previous_parse_offsets_to_autofill,
    )?;
    writer.flush()?;

    *stream = tree;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::deserialise_stream;
    use crate::{dict, record, vlist};
    use hex_literal::hex;
    use std::io::Cursor;

    fn data_unit(parse_code: u8) -> Record {
        dict![
            "parse_info" => record![records::PARSE_INFO;
                "parse_code" => parse_code,
            ],
        ]
    }

    fn picture_numbers(stream: &Record) -> Vec<Option<u64>> {
        let mut numbers = Vec::new();
        for sequence in stream["sequences"].as_list().unwrap() {
            for data_unit in sequence.as_record().unwrap()["data_units"].as_list().unwrap() {
                let data_unit = data_unit.as_record().unwrap();
                let header = data_unit
                    .get("picture_parse")
                    .and_then(Value::as_record)
                    .and_then(|p| p.get("picture_header"))
                    .or_else(|| {
                        data_unit
                            .get("fragment_parse")
                            .and_then(Value::as_record)
                            .and_then(|f| f.get("fragment_header"))
                    })
                    .and_then(Value::as_record);
                numbers.push(
                    header.and_then(|h| h.get("picture_number")).and_then(Value::as_u64),
                );
            }
        }
        numbers
    }

    #[test]
    fn picture_numbers_count_up_from_zero() {
        let mut stream = dict![
            "sequences" => vlist![dict![
                "data_units" => vlist![
                    data_unit(0xE8),
                    data_unit(0xE8),
                    data_unit(0xC8),
                    data_unit(0x10),
                ],
            ]],
        ];
        autofill_picture_number(&mut stream, 0).unwrap();
        assert_eq!(
            picture_numbers(&stream),
            vec![Some(0), Some(1), Some(2), None]
        );
    }

    #[test]
    fn explicit_picture_numbers_reset_the_counter() {
        let mut stream = dict![
            "sequences" => vlist![dict![
                "data_units" => vlist![
                    data_unit(0xE8),
                    dict![
                        "parse_info" => record![records::PARSE_INFO; "parse_code" => 0xE8u8],
                        "picture_parse" => dict![
                            "picture_header" => dict!["picture_number" => 100u8],
                        ],
                    ],
                    data_unit(0xE8),
                ],
            ]],
        ];
        autofill_picture_number(&mut stream, 0).unwrap();
        assert_eq!(
            picture_numbers(&stream),
            vec![Some(0), Some(100), Some(101)]
        );
    }

    #[test]
    fn fragments_share_their_picture_number() {
        let fragment = |count: u16| {
            dict![
                "parse_info" => record![records::PARSE_INFO; "parse_code" => 0xECu8],
                "fragment_parse" => dict![
                    "fragment_header" => dict!["fragment_slice_count" => count],
                ],
            ]
        };
        let mut stream = dict![
            "sequences" => vlist![dict![
                "data_units" => vlist![
                    fragment(0),
                    fragment(1),
                    fragment(2),
                    fragment(0),
                ],
            ]],
        ];
        autofill_picture_number(&mut stream, 10).unwrap();
        assert_eq!(
            picture_numbers(&stream),
            vec![Some(10), Some(10), Some(10), Some(11)]
        );
    }

    #[test]
    fn picture_number_wraps_modulo_2_32() {
        let mut stream = dict![
            "sequences" => vlist![dict![
                "data_units" => vlist![
                    dict![
                        "parse_info" => record![records::PARSE_INFO; "parse_code" => 0xE8u8],
                        "picture_parse" => dict![
                            "picture_header" => dict!["picture_number" => 0xFFFF_FFFFu32],
                        ],
                    ],
                    data_unit(0xE8),
                ],
            ]],
        ];
        autofill_picture_number(&mut stream, 0).unwrap();
        assert_eq!(picture_numbers(&stream), vec![Some(0xFFFF_FFFF), Some(0)]);
    }

    fn major_version_of(stream: &Record) -> Option<u64> {
        stream["sequences"].as_list().unwrap()[0]
            .as_record()
            .unwrap()["data_units"]
            .as_list()
            .unwrap()[0]
            .as_record()
            .unwrap()
            .get("sequence_header")
            .and_then(Value::as_record)
            .and_then(|h| h.get("parse_parameters"))
            .and_then(Value::as_record)
            .and_then(|p| p.get("major_version"))
            .and_then(Value::as_u64)
    }

    #[test]
    fn major_version_defaults_to_2_for_hq_profile() {
        // The default profile is high quality, requiring version 2.
        let mut stream = dict![
            "sequences" => vlist![dict![
                "data_units" => vlist![
                    dict![
                        "parse_info" => record![records::PARSE_INFO; "parse_code" => 0x00u8],
                        "sequence_header" => record![records::SEQUENCE_HEADER],
                    ],
                    data_unit(0x10),
                ],
            ]],
        ];
        autofill_major_version(&mut stream).unwrap();
        assert_eq!(major_version_of(&stream), Some(2));
    }

    #[test]
    fn fragments_imply_major_version_3() {
        let mut stream = dict![
            "sequences" => vlist![dict![
                "data_units" => vlist![
                    dict![
                        "parse_info" => record![records::PARSE_INFO; "parse_code" => 0x00u8],
                        "sequence_header" => record![records::SEQUENCE_HEADER],
                    ],
                    dict![
                        "parse_info" => record![records::PARSE_INFO; "parse_code" => 0xECu8],
                        "fragment_parse" => dict![
                            "fragment_header" => dict!["fragment_slice_count" => 0u8],
                        ],
                    ],
                    data_unit(0x10),
                ],
            ]],
        ];
        autofill_major_version(&mut stream).unwrap();
        assert_eq!(major_version_of(&stream), Some(3));
    }

    #[test]
    fn explicit_major_version_is_left_alone() {
        let mut stream = dict![
            "sequences" => vlist![dict![
                "data_units" => vlist![
                    dict![
                        "parse_info" => record![records::PARSE_INFO; "parse_code" => 0x00u8],
                        "sequence_header" => dict![
                            "parse_parameters" => dict!["major_version" => 1u8],
                        ],
                    ],
                    data_unit(0x10),
                ],
            ]],
        ];
        autofill_major_version(&mut stream).unwrap();
        assert_eq!(major_version_of(&stream), Some(1));
    }

    #[test]
    fn deduced_low_versions_strip_extended_transform_parameters() {
        let mut stream = dict![
            "sequences" => vlist![dict![
                "data_units" => vlist![
                    dict![
                        "parse_info" => record![records::PARSE_INFO; "parse_code" => 0x00u8],
                        "sequence_header" => dict![
                            "parse_parameters" => dict![
                                "major_version" => Value::Auto,
                                "profile" => crate::tables::PROFILE_HIGH_QUALITY,
                            ],
                        ],
                    ],
                    dict![
                        "parse_info" => record![records::PARSE_INFO; "parse_code" => 0xE8u8],
                        "picture_parse" => dict![
                            "wavelet_transform" => dict![
                                "transform_parameters" => dict![
                                    "wavelet_index" => 4u8,
                                    "extended_transform_parameters" =>
                                        record![records::EXTENDED_TRANSFORM_PARAMETERS;
                                            "asym_transform_index_flag" => false,
                                            "asym_transform_flag" => false,
                                        ],
                                ],
                            ],
                        ],
                    ],
                    data_unit(0x10),
                ],
            ]],
        ];
        autofill_major_version(&mut stream).unwrap();
        assert_eq!(major_version_of(&stream), Some(2));

        let transform_parameters = stream["sequences"].as_list().unwrap()[0]
            .as_record()
            .unwrap()["data_units"]
            .as_list()
            .unwrap()[1]
            .as_record()
            .unwrap()["picture_parse"]
            .as_record()
            .unwrap()["wavelet_transform"]
            .as_record()
            .unwrap()["transform_parameters"]
            .as_record()
            .unwrap();
        assert!(!transform_parameters.contains_key("extended_transform_parameters"));
    }

    #[test]
    fn asymmetric_transforms_keep_extended_parameters_and_version_3() {
        let mut stream = dict![
            "sequences" => vlist![dict![
                "data_units" => vlist![
                    dict![
                        "parse_info" => record![records::PARSE_INFO; "parse_code" => 0x00u8],
                        "sequence_header" => record![records::SEQUENCE_HEADER],
                    ],
                    dict![
                        "parse_info" => record![records::PARSE_INFO; "parse_code" => 0xE8u8],
                        "picture_parse" => dict![
                            "wavelet_transform" => dict![
                                "transform_parameters" => dict![
                                    "extended_transform_parameters" =>
                                        record![records::EXTENDED_TRANSFORM_PARAMETERS;
                                            "asym_transform_flag" => true,
                                            "dwt_depth_ho" => 2u8,
                                        ],
                                ],
                            ],
                        ],
                    ],
                    data_unit(0x10),
                ],
            ]],
        ];
        autofill_major_version(&mut stream).unwrap();
        assert_eq!(major_version_of(&stream), Some(3));

        let transform_parameters = stream["sequences"].as_list().unwrap()[0]
            .as_record()
            .unwrap()["data_units"]
            .as_list()
            .unwrap()[1]
            .as_record()
            .unwrap()["picture_parse"]
            .as_record()
            .unwrap()["wavelet_transform"]
            .as_record()
            .unwrap()["transform_parameters"]
            .as_record()
            .unwrap();
        assert!(transform_parameters.contains_key("extended_transform_parameters"));
    }

    #[test]
    fn padding_units_get_offsets_from_their_payload() {
        let mut stream = dict![
            "sequences" => vlist![dict![
                "data_units" => vlist![
                    dict![
                        "parse_info" => record![records::PARSE_INFO;
                            "parse_code" => 0x30u8,
                        ],
                        "padding" => record![records::PADDING;
                            "bytes" => vec![0u8; 5],
                        ],
                    ],
                    data_unit(0x10),
                ],
            ]],
        ];
        let (next, previous) = autofill_parse_offsets(&mut stream).unwrap();
        let parse_info = stream["sequences"].as_list().unwrap()[0]
            .as_record()
            .unwrap()["data_units"]
            .as_list()
            .unwrap()[0]
            .as_record()
            .unwrap()["parse_info"]
            .as_record()
            .unwrap();
        assert_eq!(parse_info["next_parse_offset"], Value::from(18u8));
        // Only the remaining offsets are deferred to the finalise pass.
        assert_eq!(next, vec![(0, 1)]);
        assert_eq!(previous, vec![(0, 0), (0, 1)]);
    }

    #[test]
    fn autofill_and_serialise_fills_parse_offsets_both_ways() {
        // A sequence header followed by an end-of-sequence, all offsets
        // Auto.
        let mut stream = dict![
            "sequences" => vlist![dict![
                "data_units" => vlist![
                    dict![
                        "parse_info" => record![records::PARSE_INFO;
                            "parse_code" => 0x00u8,
                            "next_parse_offset" => Value::Auto,
                            "previous_parse_offset" => Value::Auto,
                        ],
                        "sequence_header" => record![records::SEQUENCE_HEADER],
                    ],
                    dict![
                        "parse_info" => record![records::PARSE_INFO;
                            "parse_code" => 0x10u8,
                            "next_parse_offset" => Value::Auto,
                            "previous_parse_offset" => Value::Auto,
                        ],
                    ],
                ],
            ]],
        ];
        let mut bytes = Cursor::new(Vec::new());
        autofill_and_serialise_stream(&mut bytes, &mut stream).unwrap();
        let bytes = bytes.into_inner();

        // The sequence header block: version 2 + minor 0 + HQ profile +
        // level 0, base format 0, eight clear custom flags, frames.
        let header_bytes = bytes.len() as u64 - 2 * PARSE_INFO_HEADER_BYTES;
        assert_eq!(&bytes[0..5], &hex!("42 42 43 44 00"));

        let tree = deserialise_stream(Cursor::new(bytes)).unwrap();
        let data_units = tree["sequences"].as_list().unwrap()[0]
            .as_record()
            .unwrap()["data_units"]
            .as_list()
            .unwrap();
        let first = data_units[0].as_record().unwrap()["parse_info"]
            .as_record()
            .unwrap();
        let second = data_units[1].as_record().unwrap()["parse_info"]
            .as_record()
            .unwrap();

        let expected = PARSE_INFO_HEADER_BYTES + header_bytes;
        assert_eq!(first["next_parse_offset"], Value::from(expected));
        assert_eq!(first["previous_parse_offset"], Value::from(0u8));
        assert_eq!(second["next_parse_offset"], Value::from(0u8));
        assert_eq!(second["previous_parse_offset"], Value::from(expected));
    }

    #[test]
    fn autofill_is_idempotent() {
        let mut stream = dict![
            "sequences" => vlist![dict![
                "data_units" => vlist![
                    dict![
                        "parse_info" => record![records::PARSE_INFO; "parse_code" => 0x00u8],
                        "sequence_header" => record![records::SEQUENCE_HEADER],
                    ],
                    data_unit(0xE8),
                    data_unit(0x10),
                ],
            ]],
        ];
        autofill_picture_number(&mut stream, 0).unwrap();
        autofill_major_version(&mut stream).unwrap();
        autofill_parse_offsets(&mut stream).unwrap();
        let once = stream.clone();

        autofill_picture_number(&mut stream, 0).unwrap();
        autofill_major_version(&mut stream).unwrap();
        let (next, previous) = autofill_parse_offsets(&mut stream).unwrap();
        assert_eq!(stream, once);
        // The placeholder offsets are already concrete zeroes, so the
        // second pass has nothing left to fill beyond re-recording them.
        assert!(next.is_empty());
        assert!(previous.is_empty());
    }
}
