//! The VC-2 bitstream description: transcriptions of the specification's
//! parsing pseudocode against the [`SerDes`] interface.
//!
//! Each function here mirrors one pseudocode function from the
//! specification (the relevant clause number is given in its
//! documentation) and emits the same sequence of primitive operations
//! whether it is driving the [`Deserialiser`](crate::serdes::Deserialiser),
//! the [`Serialiser`](crate::serdes::Serialiser) or
//! [`PadAndTruncate`](crate::serdes::PadAndTruncate). The convenience
//! functions [`deserialise_stream`], [`serialise_stream`] and
//! [`pad_and_truncate_stream`] wire a back-end up to the top-level
//! [`parse_stream`] description.
//!
//! Slice data handling lives in [`slices`]; everything else follows the
//! clause structure of the specification: stream and data-unit headers
//! here, sequence headers in [`sequence_header`], pictures and fragments
//! in [`picture`].

mod picture;
mod sequence_header;
mod slices;

pub use picture::{
    extended_transform_parameters, fragment_header, fragment_parse, picture_header,
    picture_parse, quant_matrix, slice_parameters, transform_parameters, wavelet_transform,
};
pub use sequence_header::{
    clean_area, color_diff_sampling_format, color_matrix, color_primaries, color_spec,
    frame_rate, frame_size, parse_parameters, pixel_aspect_ratio, scan_format,
    sequence_header, signal_range, source_parameters, transfer_function,
};
pub use slices::{fragment_data, transform_data};

use std::io::{Read, Seek, Write};

use log::trace;

use crate::error::Result;
use crate::fixeddict::{Record, Value};
use crate::io::{BitstreamReader, BitstreamWriter};
use crate::records;
use crate::serdes::{DefaultValues, Deserialiser, PadAndTruncate, SerDes, Serialiser};
use crate::state::{to_u64, State};
use crate::tables::{ParseCode, PARSE_INFO_HEADER_BYTES};

/// (10.3) Parse a whole stream: a concatenation of sequences.
///
/// The loop condition serves both directions at once: a reader's
/// `sequences` list is always complete (it grows as sequences are read),
/// so reading stops at the end of the stream; a writer is always "at the
/// end of the stream", so writing stops when the provided `sequences` have
/// all been consumed.
pub fn parse_stream<S: SerDes>(serdes: &mut S) -> Result<()> {
    serdes.set_context_type(&records::STREAM)?;
    serdes.declare_list("sequences")?;
    while !(serdes.end_of_stream() && serdes.is_target_complete("sequences")) {
        serdes.subcontext("sequences", parse_sequence)?;
    }
    Ok(())
}

/// (10.4.1) Parse a sequence: data units up to and including an
/// end-of-sequence parse_info.
pub fn parse_sequence<S: SerDes>(serdes: &mut S) -> Result<()> {
    serdes.set_context_type(&records::SEQUENCE)?;
    let mut state = State::default();

    serdes.declare_list("data_units")?;

    serdes.subcontext_enter("data_units")?;
    serdes.set_context_type(&records::DATA_UNIT)?;
    serdes.subcontext("parse_info", |serdes| parse_info(serdes, &mut state))?;
    while !state.parse_code.is_end_of_sequence() {
        trace!(
            "data unit at {:?}: parse code {:#04x}",
            serdes.tell(),
            state.parse_code.0
        );
        let parse_code = state.parse_code;
        if parse_code.is_seq_header() {
            serdes.subcontext("sequence_header", |serdes| {
                sequence_header(serdes, &mut state).map(|_| ())
            })?;
        } else if parse_code.is_picture() {
            serdes.subcontext("picture_parse", |serdes| picture_parse(serdes, &mut state))?;
        } else if parse_code.is_fragment() {
            serdes.subcontext("fragment_parse", |serdes| fragment_parse(serdes, &mut state))?;
        } else if parse_code.is_auxiliary_data() {
            serdes.subcontext("auxiliary_data", |serdes| {
                auxiliary_data(serdes, &mut state)
            })?;
        } else if parse_code.is_padding_data() {
            serdes.subcontext("padding", |serdes| padding(serdes, &mut state))?;
        }
        serdes.subcontext_leave()?;

        serdes.subcontext_enter("data_units")?;
        serdes.set_context_type(&records::DATA_UNIT)?;
        serdes.subcontext("parse_info", |serdes| parse_info(serdes, &mut state))?;
    }
    serdes.subcontext_leave()?;
    Ok(())
}

/// (10.5.1) Parse a parse_info header.
///
/// The byte offset of the header is recorded in the computed `_offset`
/// value; the parse-offset auto-fill uses it to patch in next/previous
/// offsets after serialisation.
pub fn parse_info<S: SerDes>(serdes: &mut S, state: &mut State) -> Result<()> {
    serdes.set_context_type(&records::PARSE_INFO)?;
    // The wording of (10.5.1) requires this header to be byte aligned but
    // the pseudocode lacks the byte_align; it is included here.
    serdes.byte_align("padding")?;
    let (byte_offset, _) = serdes.tell();
    serdes.computed_value("_offset", Value::from(byte_offset))?;
    serdes.uint_lit("parse_info_prefix", 4)?;
    state.parse_code = ParseCode(to_u64(&serdes.uint_lit("parse_code", 1)?) as u8);
    state.next_parse_offset = to_u64(&serdes.uint_lit("next_parse_offset", 4)?);
    state.previous_parse_offset = to_u64(&serdes.uint_lit("previous_parse_offset", 4)?);
    Ok(())
}

/// (10.4.4) Parse an auxiliary data block.
pub fn auxiliary_data<S: SerDes>(serdes: &mut S, state: &mut State) -> Result<()> {
    serdes.set_context_type(&records::AUXILIARY_DATA)?;
    serdes.byte_align("padding")?;
    serdes.bytes(
        "bytes",
        state.next_parse_offset.saturating_sub(PARSE_INFO_HEADER_BYTES),
    )?;
    Ok(())
}

/// (10.4.5) Parse a padding data block.
pub fn padding<S: SerDes>(serdes: &mut S, state: &mut State) -> Result<()> {
    serdes.set_context_type(&records::PADDING)?;
    serdes.byte_align("padding")?;
    serdes.bytes(
        "bytes",
        state.next_parse_offset.saturating_sub(PARSE_INFO_HEADER_BYTES),
    )?;
    Ok(())
}

/// Deserialise a whole stream into a tree of records.
pub fn deserialise_stream<R: Read + Seek>(reader: R) -> Result<Record> {
    let mut deserialiser = Deserialiser::new(BitstreamReader::new(reader)?);
    parse_stream(&mut deserialiser)?;
    deserialiser.finish()
}

/// Serialise a stream tree, with the standard default values filling in
/// absent constant fields. Returns the serialised tree (with computed
/// values added).
///
/// Every [`Value::Auto`] must have been resolved first; see
/// [`autofill_and_serialise_stream`](crate::autofill::autofill_and_serialise_stream)
/// for the auto-filling entry point.
pub fn serialise_stream<W: Write + Seek>(writer: W, stream: Record) -> Result<Record> {
    serialise_stream_with_defaults(writer, stream, records::default_values())
}

/// Serialise a stream tree with a caller-supplied default-value table.
pub fn serialise_stream_with_defaults<W: Write + Seek>(
    writer: W,
    stream: Record,
    default_values: DefaultValues,
) -> Result<Record> {
    let mut serialiser = Serialiser::new(BitstreamWriter::new(writer)?, stream, default_values);
    parse_stream(&mut serialiser)?;
    let (mut io, context) = serialiser.finish()?;
    io.flush()?;
    Ok(context)
}

/// Normalise a stream tree to exactly the shape serialisation would
/// consume: missing values zero-filled, over-wide values truncated,
/// over-long lists shortened.
pub fn pad_and_truncate_stream(stream: Record) -> Result<Record> {
    let mut pad = PadAndTruncate::new(stream);
    parse_stream(&mut pad)?;
    pad.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::PARSE_INFO_PREFIX;
    use crate::{dict, record, vlist};
    use hex_literal::hex;
    use std::io::Cursor;

    fn eos_parse_info() -> Record {
        record![records::PARSE_INFO;
            "parse_code" => ParseCode::END_OF_SEQUENCE.0,
        ]
    }

    fn serialise(stream: Record) -> (Vec<u8>, Record) {
        let mut bytes = Cursor::new(Vec::new());
        let tree = serialise_stream(&mut bytes, stream).unwrap();
        (bytes.into_inner(), tree)
    }

    #[test]
    fn minimal_stream_serialises_to_a_lone_parse_info() {
        let stream = dict![
            "sequences" => vlist![
                dict!["data_units" => vlist![dict!["parse_info" => eos_parse_info()]]],
            ],
        ];
        let (bytes, _) = serialise(stream);
        assert_eq!(
            bytes,
            hex!("42 42 43 44 10 00 00 00 00 00 00 00 00")
        );
    }

    #[test]
    fn minimal_stream_deserialises_back() {
        let bytes = hex!("42 42 43 44 10 00 00 00 00 00 00 00 00");
        let tree = deserialise_stream(Cursor::new(bytes.to_vec())).unwrap();

        let sequences = tree["sequences"].as_list().unwrap();
        assert_eq!(sequences.len(), 1);
        let data_units = sequences[0].as_record().unwrap()["data_units"]
            .as_list()
            .unwrap();
        assert_eq!(data_units.len(), 1);
        let parse_info = data_units[0].as_record().unwrap()["parse_info"]
            .as_record()
            .unwrap();
        assert_eq!(parse_info.type_name(), "ParseInfo");
        assert_eq!(
            parse_info["parse_info_prefix"],
            Value::from(PARSE_INFO_PREFIX)
        );
        assert_eq!(
            parse_info["parse_code"],
            Value::from(ParseCode::END_OF_SEQUENCE.0)
        );
        assert_eq!(parse_info["_offset"], Value::from(0u8));
    }

    #[test]
    fn empty_input_deserialises_to_no_sequences() {
        let tree = deserialise_stream(Cursor::new(Vec::new())).unwrap();
        assert_eq!(tree["sequences"], vlist![]);
    }

    #[test]
    fn concatenated_sequences_deserialise_separately() {
        let eos = hex!("42 42 43 44 10 00 00 00 00 00 00 00 00");
        let mut bytes = eos.to_vec();
        bytes.extend_from_slice(&eos);
        let tree = deserialise_stream(Cursor::new(bytes)).unwrap();
        assert_eq!(tree["sequences"].as_list().unwrap().len(), 2);
    }

    #[test]
    fn padding_data_unit_round_trips() {
        let stream = dict![
            "sequences" => vlist![dict![
                "data_units" => vlist![
                    dict![
                        "parse_info" => record![records::PARSE_INFO;
                            "parse_code" => ParseCode::PADDING_DATA.0,
                            "next_parse_offset" => 16u8,
                        ],
                        "padding" => record![records::PADDING;
                            "bytes" => vec![0xDEu8, 0xADu8, 0xBEu8],
                        ],
                    ],
                    dict!["parse_info" => eos_parse_info()],
                ],
            ]],
        ];
        let (bytes, _) = serialise(stream);
        assert_eq!(bytes.len(), 13 + 3 + 13);
        assert_eq!(&bytes[13..16], &[0xDE, 0xAD, 0xBE]);

        // Byte-exact round trip.
        let tree = deserialise_stream(Cursor::new(bytes.clone())).unwrap();
        let (bytes2, _) = serialise(tree);
        assert_eq!(bytes, bytes2);
    }

    #[test]
    fn unknown_parse_codes_leave_a_bare_parse_info() {
        // Parse code 0x42 matches none of the data unit classes; the data
        // unit holds only its parse_info and parsing carries on.
        let stream = dict![
            "sequences" => vlist![dict![
                "data_units" => vlist![
                    dict![
                        "parse_info" => record![records::PARSE_INFO;
                            "parse_code" => 0x42u8,
                        ],
                    ],
                    dict!["parse_info" => eos_parse_info()],
                ],
            ]],
        ];
        let (bytes, _) = serialise(stream);
        let tree = deserialise_stream(Cursor::new(bytes)).unwrap();
        let data_units = tree["sequences"].as_list().unwrap()[0].as_record().unwrap()
            ["data_units"]
            .as_list()
            .unwrap();
        assert_eq!(data_units.len(), 2);
        let first = data_units[0].as_record().unwrap();
        assert!(first.contains_key("parse_info"));
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn fragmented_picture_stream_round_trips_byte_exactly() {
        // Sequence header, a first fragment carrying transform parameters,
        // a second fragment carrying two HQ slices, end of sequence.
        let sequence_header = record![records::SEQUENCE_HEADER;
            "parse_parameters" => record![records::PARSE_PARAMETERS;
                "major_version" => 3u8,
            ],
            "video_parameters" => record![records::SOURCE_PARAMETERS;
                "frame_size" => record![records::FRAME_SIZE;
                    "custom_dimensions_flag" => true,
                    "frame_width" => 4u8,
                    "frame_height" => 4u8,
                ],
                "color_diff_sampling_format" => record![records::COLOR_DIFF_SAMPLING_FORMAT;
                    "custom_color_diff_format_flag" => true,
                    "color_diff_format_index" => 0u8,
                ],
            ],
        ];
        let first_fragment = dict![
            "parse_info" => record![records::PARSE_INFO;
                "parse_code" => ParseCode::HIGH_QUALITY_PICTURE_FRAGMENT.0,
            ],
            "fragment_parse" => record![records::FRAGMENT_PARSE;
                "fragment_header" => record![records::FRAGMENT_HEADER;
                    "fragment_slice_count" => 0u8,
                ],
                "transform_parameters" => record![records::TRANSFORM_PARAMETERS;
                    "slice_parameters" => record![records::SLICE_PARAMETERS;
                        "slices_x" => 2u8,
                        "slices_y" => 1u8,
                        "slice_prefix_bytes" => 0u8,
                        "slice_size_scaler" => 1u8,
                    ],
                ],
            ],
        ];
        let coefficients = Value::List(
            [1i64, -1, 2, -2, 3, -3, 4, -4, 5, -5, 6, -6, 7, -7, 8, -8]
                .iter()
                .map(|&v| Value::from(v))
                .collect(),
        );
        let zeroes = Value::List(vec![Value::from(0u8); 16]);
        let per_slice = |value: Value| Value::List(vec![value; 2]);
        let second_fragment = dict![
            "parse_info" => record![records::PARSE_INFO;
                "parse_code" => ParseCode::HIGH_QUALITY_PICTURE_FRAGMENT.0,
            ],
            "fragment_parse" => record![records::FRAGMENT_PARSE;
                "fragment_header" => record![records::FRAGMENT_HEADER;
                    "fragment_slice_count" => 2u8,
                    "fragment_x_offset" => 0u8,
                    "fragment_y_offset" => 0u8,
                ],
                "hq_slice_array" => record![records::HQ_SLICE_ARRAY;
                    "prefix_bytes" => per_slice(Value::Bytes(Vec::new())),
                    "qindex" => vlist![1u8, 2u8],
                    "slice_y_length" => vlist![6u8, 8u8],
                    "slice_c1_length" => vlist![6u8, 6u8],
                    "slice_c2_length" => vlist![6u8, 6u8],
                    "y_transform" => coefficients,
                    "c1_transform" => zeroes.clone(),
                    "c2_transform" => zeroes,
                    "y_block_padding" => per_slice(Value::Bits(crate::io::Bits::new())),
                    "c1_block_padding" => per_slice(Value::Bits(crate::io::Bits::new())),
                    "c2_block_padding" => per_slice(Value::Bits(crate::io::Bits::new())),
                ],
            ],
        ];
        let stream = dict![
            "sequences" => vlist![dict![
                "data_units" => vlist![
                    dict![
                        "parse_info" => record![records::PARSE_INFO; "parse_code" => 0x00u8],
                        "sequence_header" => sequence_header,
                    ],
                    first_fragment,
                    second_fragment,
                    dict!["parse_info" => eos_parse_info()],
                ],
            ]],
        ];

        let (bytes, _) = serialise(stream);
        let tree = deserialise_stream(Cursor::new(bytes.clone())).unwrap();
        let (bytes2, _) = serialise(tree.clone());
        assert_eq!(bytes, bytes2);

        // The slice data landed in the second fragment's slice array.
        let array = tree["sequences"].as_list().unwrap()[0].as_record().unwrap()
            ["data_units"]
            .as_list()
            .unwrap()[2]
            .as_record()
            .unwrap()["fragment_parse"]
            .as_record()
            .unwrap()["hq_slice_array"]
            .as_record()
            .unwrap();
        assert_eq!(array["qindex"], vlist![1u8, 2u8]);
        assert_eq!(array["y_transform"].as_list().unwrap().len(), 16);
    }

    #[test]
    fn pad_and_truncate_normalises_a_sparse_stream() {
        let stream = dict![
            "sequences" => vlist![dict![
                "data_units" => vlist![dict![
                    "parse_info" => dict![
                        // Missing prefix and offsets; over-wide parse code.
                        "parse_code" => 0x0110u16,
                    ],
                ]],
            ]],
        ];
        let tree = pad_and_truncate_stream(stream).unwrap();
        let parse_info = tree["sequences"].as_list().unwrap()[0].as_record().unwrap()
            ["data_units"]
            .as_list()
            .unwrap()[0]
            .as_record()
            .unwrap()["parse_info"]
            .as_record()
            .unwrap();
        // 0x0110 truncated to its low byte, 0x10 = end of sequence.
        assert_eq!(parse_info["parse_code"], Value::from(0x10u8));
        assert_eq!(parse_info["parse_info_prefix"], Value::from(0u8));
        assert_eq!(parse_info["next_parse_offset"], Value::from(0u8));

        // Normalising again changes nothing.
        let again = pad_and_truncate_stream(tree.clone()).unwrap();
        assert_eq!(tree, again);
    }
}
