//! Views over flattened slice data.
//!
//! Slices make up the vast majority of a coded picture and contain
//! regular, repeated structures. Rather than representing each slice as
//! its own record, all slices in a contiguous run are accumulated into a
//! single record of parallel flat lists in bitstream order (one list per
//! field: `qindex`, transform coefficients, block padding, ...), stored
//! under `ld_slice_array` or `hq_slice_array`.
//!
//! The types here give structured access back into those flat lists:
//! [`LdSliceArray`] / [`HqSliceArray`] wrap the record, [`LdSliceView`] /
//! [`HqSliceView`] address one slice by coordinate, and
//! [`ComponentView`] / [`SubbandView`] drill down to individual transform
//! coefficients by `(level, subband)` and `(x, y)`.
//!
//! Slice y-coordinates beyond `slices_y` are deliberately *not* rejected:
//! malformed bitstreams may contain extra slices past the end of the
//! picture, and this library must still be able to inspect them.

use num_bigint::BigInt;

use crate::error::{Error, Result};
use crate::fixeddict::{Record, Value};
use crate::io::Bits;
use crate::records;
use crate::slice_sizes::{intlog2, Component};

/// A wavelet subband name, in the order they appear in the bitstream.
///
/// The DC component is called `DC` when no transform is used, `LL` when
/// only a 2D transform is used and `L` when a horizontal-only transform is
/// used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subband {
    Dc,
    L,
    Ll,
    H,
    Hl,
    Lh,
    Hh,
}

/// Convert a flat subband index into a `(level, subband)` pair.
///
/// The array order is: the DC/L/LL subband, then the horizontal-only `H`
/// subbands, then `HL`, `LH` and `HH` (in that order) for each 2D level.
pub fn index_to_subband(index: u64, dwt_depth: u64, dwt_depth_ho: u64) -> Result<(u64, Subband)> {
    if index == 0 {
        let subband = if dwt_depth == 0 && dwt_depth_ho == 0 {
            Subband::Dc
        } else if dwt_depth_ho != 0 {
            Subband::L
        } else {
            Subband::Ll
        };
        return Ok((0, subband));
    }

    if index < dwt_depth_ho + 1 {
        return Ok((index, Subband::H));
    }

    let offset_index = index - dwt_depth_ho - 1;
    let level = 1 + dwt_depth_ho + (offset_index / 3);
    if level > dwt_depth + dwt_depth_ho {
        return Err(Error::IndexOutOfRange("subband index"));
    }
    let subband = match offset_index % 3 {
        0 => Subband::Hl,
        1 => Subband::Lh,
        _ => Subband::Hh,
    };
    Ok((level, subband))
}

/// Convert a `(level, subband)` pair into a flat subband index.
pub fn subband_to_index(
    level: u64,
    subband: Subband,
    dwt_depth: u64,
    dwt_depth_ho: u64,
) -> Result<u64> {
    if level == 0 {
        let expected = if dwt_depth_ho == 0 && dwt_depth == 0 {
            Subband::Dc
        } else if dwt_depth_ho > 0 {
            Subband::L
        } else {
            Subband::Ll
        };
        if subband != expected {
            return Err(Error::IndexOutOfRange("subband"));
        }
        Ok(0)
    } else if level < 1 + dwt_depth_ho {
        if subband != Subband::H {
            return Err(Error::IndexOutOfRange("subband"));
        }
        Ok(level)
    } else if level < 1 + dwt_depth_ho + dwt_depth {
        let offset = match subband {
            Subband::Hl => 0,
            Subband::Lh => 1,
            Subband::Hh => 2,
            _ => return Err(Error::IndexOutOfRange("subband")),
        };
        Ok(1 + dwt_depth_ho + (level - dwt_depth_ho - 1) * 3 + offset)
    } else {
        Err(Error::IndexOutOfRange("subband level"))
    }
}

/// The computed parameters needed to interpret an array of slice data,
/// along with the coordinate arithmetic built on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceArrayParameters {
    pub slices_x: u64,
    pub slices_y: u64,
    pub start_sx: u64,
    pub start_sy: u64,
    pub slice_count: u64,
    pub dwt_depth: u64,
    pub dwt_depth_ho: u64,
    pub luma_width: u64,
    pub luma_height: u64,
    pub color_diff_width: u64,
    pub color_diff_height: u64,
}

impl Default for SliceArrayParameters {
    fn default() -> SliceArrayParameters {
        SliceArrayParameters {
            slices_x: 1,
            slices_y: 1,
            start_sx: 0,
            start_sy: 0,
            slice_count: 1,
            dwt_depth: 0,
            dwt_depth_ho: 0,
            luma_width: 1,
            luma_height: 1,
            color_diff_width: 1,
            color_diff_height: 1,
        }
    }
}

impl SliceArrayParameters {
    /// Rebuild the parameters from their in-tree record form, substituting
    /// defaults for any missing field.
    pub fn from_record(record: &Record) -> SliceArrayParameters {
        let field = |key: &str, fallback: u64| {
            record.get(key).and_then(Value::as_u64).unwrap_or(fallback)
        };
        let defaults = SliceArrayParameters::default();
        SliceArrayParameters {
            slices_x: field("slices_x", defaults.slices_x),
            slices_y: field("slices_y", defaults.slices_y),
            start_sx: field("start_sx", defaults.start_sx),
            start_sy: field("start_sy", defaults.start_sy),
            slice_count: field("slice_count", defaults.slice_count),
            dwt_depth: field("dwt_depth", defaults.dwt_depth),
            dwt_depth_ho: field("dwt_depth_ho", defaults.dwt_depth_ho),
            luma_width: field("luma_width", defaults.luma_width),
            luma_height: field("luma_height", defaults.luma_height),
            color_diff_width: field("color_diff_width", defaults.color_diff_width),
            color_diff_height: field("color_diff_height", defaults.color_diff_height),
        }
    }

    /// The in-tree record form of these parameters.
    pub fn to_record(&self) -> Record {
        crate::record![records::SLICE_ARRAY_PARAMETERS;
            "slices_x" => self.slices_x,
            "slices_y" => self.slices_y,
            "start_sx" => self.start_sx,
            "start_sy" => self.start_sy,
            "slice_count" => self.slice_count,
            "dwt_depth" => self.dwt_depth,
            "dwt_depth_ho" => self.dwt_depth_ho,
            "luma_width" => self.luma_width,
            "luma_height" => self.luma_height,
            "color_diff_width" => self.color_diff_width,
            "color_diff_height" => self.color_diff_height,
        ]
    }

    /// The index into this slice array of the slice at `(sx, sy)`.
    /// Negative for slices before the array's starting coordinate.
    pub fn to_slice_index(&self, sx: u64, sy: u64) -> i64 {
        let index = (sy as i64 * self.slices_x as i64) + sx as i64;
        let offset = (self.start_sy as i64 * self.slices_x as i64) + self.start_sx as i64;
        index - offset
    }

    /// The `(sx, sy)` coordinate of the slice at `slice_index`.
    pub fn from_slice_index(&self, slice_index: u64) -> (u64, u64) {
        let offset = self.start_sx + (self.start_sy * self.slices_x);
        let index = slice_index + offset;
        let slices_x = self.slices_x.max(1);
        (index % slices_x, index / slices_x)
    }

    /// (13.2.3) The `(width, height)` of a component subband, for a
    /// component of dimensions `w` x `h`.
    pub fn subband_dimensions(&self, w: u64, h: u64, level: u64) -> (u64, u64) {
        let depth = self.dwt_depth_ho.saturating_add(self.dwt_depth);
        let scale_w = 1u64.checked_shl(depth.min(64) as u32).unwrap_or(u64::MAX);
        let scale_h = 1u64
            .checked_shl(self.dwt_depth.min(64) as u32)
            .unwrap_or(u64::MAX);

        let pw = scale_w.saturating_mul(w.saturating_add(scale_w - 1) / scale_w);
        let ph = scale_h.saturating_mul(h.saturating_add(scale_h - 1) / scale_h);

        let subband_width = if level == 0 {
            pw >> depth.min(63)
        } else {
            pw >> (depth - level + 1).min(63)
        };
        let subband_height = if level <= self.dwt_depth_ho {
            ph >> self.dwt_depth.min(63)
        } else {
            ph >> (depth - level + 1).min(63)
        };

        (subband_width, subband_height)
    }

    /// (13.5.6.2) The `(x1, y1, x2, y2)` bounds of slice `(sx, sy)` within
    /// a subband of the given dimensions.
    pub fn slice_subband_bounds(
        &self,
        sx: u64,
        sy: u64,
        subband_width: u64,
        subband_height: u64,
    ) -> (u64, u64, u64, u64) {
        let slices_x = self.slices_x.max(1);
        let slices_y = self.slices_y.max(1);
        (
            subband_width.saturating_mul(sx) / slices_x,
            subband_height.saturating_mul(sy) / slices_y,
            subband_width.saturating_mul(sx + 1) / slices_x,
            subband_height.saturating_mul(sy + 1) / slices_y,
        )
    }

    /// Compute the index of a coefficient in a flat per-component array
    /// holding a whole run of slices in bitstream order, conceptually
    /// `coeffs[sy][sx][subband_index][y][x]`, with slices ordered
    /// slice-major, then subband-major, then row-major.
    ///
    /// Every coordinate except `sy` is range-checked; out-of-range `sy`
    /// values are accepted so that slices beyond the end of a (malformed)
    /// picture remain addressable.
    pub fn to_coeff_index(
        &self,
        subband_dimensions: &[(u64, u64)],
        sx: u64,
        sy: u64,
        subband_index: u64,
        x: u64,
        y: u64,
    ) -> Result<u64> {
        if sx >= self.slices_x {
            return Err(Error::IndexOutOfRange("slice x-coordinate"));
        }
        if subband_index >= subband_dimensions.len() as u64 {
            return Err(Error::IndexOutOfRange("subband index"));
        }

        let mut offset: i64 = 0;
        let mut subband_slice_width = 0;
        let mut subband_slice_height = 0;

        // Accumulate the sizes of this slice's data in every earlier
        // subband, plus the offset to the slice's own top-left corner in
        // the target subband. The starting slice's offset is subtracted so
        // arrays beginning mid-picture (fragments) index from zero.
        for (cur_index, &(subband_width, subband_height)) in
            subband_dimensions.iter().enumerate()
        {
            let (ox1, oy1, oy2) = {
                let (ox1, oy1, _, oy2) = self.slice_subband_bounds(
                    self.start_sx,
                    self.start_sy,
                    subband_width,
                    subband_height,
                );
                (ox1, oy1, oy2)
            };
            let (x1, y1, x2, y2) =
                self.slice_subband_bounds(sx, sy, subband_width, subband_height);

            offset -= (oy1 * subband_width + ox1 * (oy2 - oy1)) as i64;

            if cur_index as u64 >= subband_index {
                offset += (y1 * subband_width + x1 * (y2 - y1)) as i64;
            } else {
                offset += (y1 * subband_width + x2 * (y2 - y1)) as i64;
            }

            if cur_index as u64 == subband_index {
                subband_slice_width = x2 - x1;
                subband_slice_height = y2 - y1;
            }
        }

        // When many slices or transform levels are used, some subbands
        // have zero size in some slices; (0, 0) remains a legal address
        // for them.
        if !(subband_slice_width == 0 && x == 0 || x < subband_slice_width) {
            return Err(Error::IndexOutOfRange("slice value x-coordinate"));
        }
        if !(subband_slice_height == 0 && y == 0 || y < subband_slice_height) {
            return Err(Error::IndexOutOfRange("slice value y-coordinate"));
        }

        offset += (y * subband_slice_width + x) as i64;

        if offset < 0 {
            return Err(Error::IndexOutOfRange("slice coordinate"));
        }
        Ok(offset as u64)
    }

    /// The number of transform levels, including level 0.
    pub fn num_subband_levels(&self) -> u64 {
        1 + self.dwt_depth_ho + self.dwt_depth
    }

    /// The total number of subbands.
    pub fn num_subbands(&self) -> u64 {
        1 + self.dwt_depth_ho + (self.dwt_depth * 3)
    }

    fn component_dimensions(&self, component: Component) -> (u64, u64) {
        match component {
            Component::Y => (self.luma_width, self.luma_height),
            Component::C1 | Component::C2 => (self.color_diff_width, self.color_diff_height),
        }
    }

    /// `(width, height)` of every subband of the given component, in
    /// bitstream order.
    pub fn component_subband_dimensions(&self, component: Component) -> Vec<(u64, u64)> {
        let (w, h) = self.component_dimensions(component);
        let mut dimensions = Vec::with_capacity(self.num_subbands() as usize);
        for level in 0..self.num_subband_levels() {
            let repeats = if level < 1 + self.dwt_depth_ho { 1 } else { 3 };
            for _ in 0..repeats {
                dimensions.push(self.subband_dimensions(w, h, level));
            }
        }
        dimensions
    }
}

fn list_value<'a>(record: &'a Record, key: &'static str, index: u64) -> Result<&'a Value> {
    record
        .get(key)
        .and_then(Value::as_list)
        .and_then(|list| list.get(index as usize))
        .ok_or(Error::IndexOutOfRange("slice index"))
}

fn set_list_value(record: &mut Record, key: &'static str, index: u64, value: Value) -> Result<()> {
    let slot = record
        .get_mut(key)
        .and_then(Value::as_list_mut)
        .and_then(|list| list.get_mut(index as usize))
        .ok_or(Error::IndexOutOfRange("slice index"))?;
    *slot = value;
    Ok(())
}

/// A view into a particular subband of one slice and component. Indexable
/// by `(x, y)` coordinate or linearly, for both reads and writes.
pub struct SubbandView<'s> {
    record: &'s mut Record,
    key: &'static str,
    stride: u64,
    phase: u64,
    start: u64,
    width: u64,
    height: u64,
}

impl<'s> SubbandView<'s> {
    /// The `(width, height)` of this slice's part of the subband.
    pub fn dimensions(&self) -> (u64, u64) {
        (self.width, self.height)
    }

    pub fn len(&self) -> u64 {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The coefficient index of this view's first value within the
    /// component's flat coefficient space.
    pub fn start_index(&self) -> u64 {
        self.start
    }

    /// One-past-the-end coefficient index.
    pub fn end_index(&self) -> u64 {
        self.start + self.len()
    }

    fn coeff_index(&self, x: u64, y: u64) -> Result<u64> {
        if !(self.width == 0 && x == 0 || x < self.width) {
            return Err(Error::IndexOutOfRange("slice value x-coordinate"));
        }
        if !(self.height == 0 && y == 0 || y < self.height) {
            return Err(Error::IndexOutOfRange("slice value y-coordinate"));
        }
        Ok(self.start + y * self.width + x)
    }

    fn flat_index(&self, coeff_index: u64) -> u64 {
        coeff_index * self.stride + self.phase
    }

    fn get_coeff(&self, coeff_index: u64) -> Result<BigInt> {
        list_value(self.record, self.key, self.flat_index(coeff_index))?
            .as_int()
            .cloned()
            .ok_or(Error::IndexOutOfRange("coefficient"))
    }

    pub fn get(&self, x: u64, y: u64) -> Result<BigInt> {
        self.get_coeff(self.coeff_index(x, y)?)
    }

    pub fn get_linear(&self, index: u64) -> Result<BigInt> {
        if self.width == 0 {
            return Err(Error::IndexOutOfRange("coefficient"));
        }
        self.get(index % self.width, index / self.width)
    }

    pub fn set(&mut self, x: u64, y: u64, value: BigInt) -> Result<()> {
        let index = self.flat_index(self.coeff_index(x, y)?);
        set_list_value(self.record, self.key, index, Value::Int(value))
    }

    pub fn set_linear(&mut self, index: u64, value: BigInt) -> Result<()> {
        if self.width == 0 {
            return Err(Error::IndexOutOfRange("coefficient"));
        }
        self.set(index % self.width, index / self.width, value)
    }

    /// All of this view's coefficients, row-major.
    pub fn values(&self) -> Result<Vec<BigInt>> {
        (0..self.len()).map(|i| self.get_coeff(self.start + i)).collect()
    }
}

/// A view of the transform coefficients of one component of one slice.
pub struct ComponentView<'c> {
    record: &'c mut Record,
    parameters: SliceArrayParameters,
    key: &'static str,
    component: Component,
    stride: u64,
    phase: u64,
    sx: u64,
    sy: u64,
}

impl<'c> ComponentView<'c> {
    pub fn num_subbands(&self) -> u64 {
        self.parameters.num_subbands()
    }

    /// The subband at `(level, subband)`, e.g. `(2, Subband::Hl)`.
    pub fn subband(&mut self, level: u64, subband: Subband) -> Result<SubbandView<'_>> {
        let index = subband_to_index(
            level,
            subband,
            self.parameters.dwt_depth,
            self.parameters.dwt_depth_ho,
        )?;
        self.subband_index(index)
    }

    /// The subband at a flat index, in bitstream order.
    pub fn subband_index(&mut self, subband_index: u64) -> Result<SubbandView<'_>> {
        let dimensions = self.parameters.component_subband_dimensions(self.component);
        if subband_index >= dimensions.len() as u64 {
            return Err(Error::IndexOutOfRange("subband index"));
        }
        let (subband_width, subband_height) = dimensions[subband_index as usize];
        let (x1, y1, x2, y2) =
            self.parameters
                .slice_subband_bounds(self.sx, self.sy, subband_width, subband_height);
        let start =
            self.parameters
                .to_coeff_index(&dimensions, self.sx, self.sy, subband_index, 0, 0)?;
        Ok(SubbandView {
            record: &mut *self.record,
            key: self.key,
            stride: self.stride,
            phase: self.phase,
            start,
            width: x2 - x1,
            height: y2 - y1,
        })
    }
}

/// An array of consecutive coded low-delay picture slices (13.5.3.1).
pub struct LdSliceArray<'a> {
    record: &'a mut Record,
    parameters: SliceArrayParameters,
    slice_bytes_numerator: u64,
    slice_bytes_denominator: u64,
}

impl<'a> LdSliceArray<'a> {
    pub fn new(record: &'a mut Record) -> Result<LdSliceArray<'a>> {
        let parameters = record
            .get("_parameters")
            .and_then(Value::as_record)
            .map(SliceArrayParameters::from_record)
            .ok_or_else(|| Error::MissingTarget("LDSliceArray['_parameters']".to_string()))?;
        let slice_bytes_numerator = record
            .get("_slice_bytes_numerator")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let slice_bytes_denominator = record
            .get("_slice_bytes_denominator")
            .and_then(Value::as_u64)
            .unwrap_or(1)
            .max(1);
        Ok(LdSliceArray {
            record,
            parameters,
            slice_bytes_numerator,
            slice_bytes_denominator,
        })
    }

    pub fn parameters(&self) -> &SliceArrayParameters {
        &self.parameters
    }

    /// The number of slices held by this array.
    pub fn num_slices(&self) -> u64 {
        self.record
            .get("qindex")
            .and_then(Value::as_list)
            .map_or(0, |list| list.len() as u64)
    }

    /// A view of the slice at coordinate `(sx, sy)`.
    pub fn slice(&mut self, sx: u64, sy: u64) -> LdSliceView<'_> {
        LdSliceView {
            record: &mut *self.record,
            parameters: self.parameters,
            slice_bytes_numerator: self.slice_bytes_numerator,
            slice_bytes_denominator: self.slice_bytes_denominator,
            sx,
            sy,
        }
    }

    /// A view of the slice at an index into this array.
    pub fn slice_at(&mut self, slice_index: u64) -> LdSliceView<'_> {
        let (sx, sy) = self.parameters.from_slice_index(slice_index);
        self.slice(sx, sy)
    }
}

/// A view of a single low-delay slice.
pub struct LdSliceView<'v> {
    record: &'v mut Record,
    parameters: SliceArrayParameters,
    slice_bytes_numerator: u64,
    slice_bytes_denominator: u64,
    sx: u64,
    sy: u64,
}

impl<'v> LdSliceView<'v> {
    pub fn sx(&self) -> u64 {
        self.sx
    }

    pub fn sy(&self) -> u64 {
        self.sy
    }

    pub fn slice_index(&self) -> Result<u64> {
        let index = self.parameters.to_slice_index(self.sx, self.sy);
        if index < 0 {
            return Err(Error::IndexOutOfRange("slice index"));
        }
        Ok(index as u64)
    }

    pub fn qindex(&self) -> Result<BigInt> {
        list_value(self.record, "qindex", self.slice_index()?)?
            .as_int()
            .cloned()
            .ok_or(Error::IndexOutOfRange("qindex"))
    }

    pub fn set_qindex(&mut self, value: BigInt) -> Result<()> {
        let index = self.slice_index()?;
        set_list_value(self.record, "qindex", index, Value::Int(value))
    }

    pub fn slice_y_length(&self) -> Result<u64> {
        list_value(self.record, "slice_y_length", self.slice_index()?)?
            .as_u64()
            .ok_or(Error::IndexOutOfRange("slice_y_length"))
    }

    pub fn set_slice_y_length(&mut self, value: u64) -> Result<()> {
        let index = self.slice_index()?;
        set_list_value(self.record, "slice_y_length", index, Value::from(value))
    }

    pub fn y_block_padding(&self) -> Result<Bits> {
        list_value(self.record, "y_block_padding", self.slice_index()?)?
            .as_bits()
            .cloned()
            .ok_or(Error::IndexOutOfRange("y_block_padding"))
    }

    pub fn c_block_padding(&self) -> Result<Bits> {
        list_value(self.record, "c_block_padding", self.slice_index()?)?
            .as_bits()
            .cloned()
            .ok_or(Error::IndexOutOfRange("c_block_padding"))
    }

    /// (13.5.3.2) The total length of this slice in bits.
    pub fn length(&self) -> u64 {
        let slice_number =
            (self.sy.saturating_mul(self.parameters.slices_x)).saturating_add(self.sx) as u128;
        let numerator = self.slice_bytes_numerator as u128;
        let denominator = self.slice_bytes_denominator as u128;
        let slice_bytes = ((slice_number + 1) * numerator) / denominator
            - (slice_number * numerator) / denominator;
        8 * slice_bytes.min((u64::MAX / 8) as u128) as u64
    }

    /// The total length of the `qindex` and `slice_y_length` fields.
    pub fn header_length(&self) -> u64 {
        7 + intlog2(self.length().saturating_sub(7))
    }

    /// The length of the luma bounded block, clamping stored
    /// `slice_y_length` values which (erroneously) exceed the slice.
    pub fn true_slice_y_length(&self) -> Result<u64> {
        let max_slice_y_length = self.length().saturating_sub(self.header_length());
        Ok(max_slice_y_length.min(self.slice_y_length()?))
    }

    /// The computed length of the colour-difference bounded block.
    pub fn slice_c_length(&self) -> Result<u64> {
        Ok(self
            .length()
            .saturating_sub(self.header_length())
            .saturating_sub(self.true_slice_y_length()?))
    }

    pub fn y_transform(&mut self) -> ComponentView<'_> {
        ComponentView {
            record: &mut *self.record,
            parameters: self.parameters,
            key: "y_transform",
            component: Component::Y,
            stride: 1,
            phase: 0,
            sx: self.sx,
            sy: self.sy,
        }
    }

    /// The first colour-difference component. LD slices interleave C1 and
    /// C2 coefficients in the single `c_transform` list, so the views
    /// address it with a stride of two.
    pub fn c1_transform(&mut self) -> ComponentView<'_> {
        self.color_diff_transform(0)
    }

    /// The second colour-difference component.
    pub fn c2_transform(&mut self) -> ComponentView<'_> {
        self.color_diff_transform(1)
    }

    fn color_diff_transform(&mut self, phase: u64) -> ComponentView<'_> {
        ComponentView {
            record: &mut *self.record,
            parameters: self.parameters,
            key: "c_transform",
            component: Component::C1,
            stride: 2,
            phase,
            sx: self.sx,
            sy: self.sy,
        }
    }
}

/// An array of consecutive coded high-quality picture slices (13.5.4).
pub struct HqSliceArray<'a> {
    record: &'a mut Record,
    parameters: SliceArrayParameters,
    slice_prefix_bytes: u64,
    slice_size_scaler: u64,
}

impl<'a> HqSliceArray<'a> {
    pub fn new(record: &'a mut Record) -> Result<HqSliceArray<'a>> {
        let parameters = record
            .get("_parameters")
            .and_then(Value::as_record)
            .map(SliceArrayParameters::from_record)
            .ok_or_else(|| Error::MissingTarget("HQSliceArray['_parameters']".to_string()))?;
        let slice_prefix_bytes = record
            .get("_slice_prefix_bytes")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let slice_size_scaler = record
            .get("_slice_size_scaler")
            .and_then(Value::as_u64)
            .unwrap_or(1);
        Ok(HqSliceArray {
            record,
            parameters,
            slice_prefix_bytes,
            slice_size_scaler,
        })
    }

    pub fn parameters(&self) -> &SliceArrayParameters {
        &self.parameters
    }

    pub fn num_slices(&self) -> u64 {
        self.record
            .get("qindex")
            .and_then(Value::as_list)
            .map_or(0, |list| list.len() as u64)
    }

    pub fn slice(&mut self, sx: u64, sy: u64) -> HqSliceView<'_> {
        HqSliceView {
            record: &mut *self.record,
            parameters: self.parameters,
            slice_prefix_bytes: self.slice_prefix_bytes,
            slice_size_scaler: self.slice_size_scaler,
            sx,
            sy,
        }
    }

    pub fn slice_at(&mut self, slice_index: u64) -> HqSliceView<'_> {
        let (sx, sy) = self.parameters.from_slice_index(slice_index);
        self.slice(sx, sy)
    }
}

/// A view of a single high-quality slice.
pub struct HqSliceView<'v> {
    record: &'v mut Record,
    parameters: SliceArrayParameters,
    slice_prefix_bytes: u64,
    slice_size_scaler: u64,
    sx: u64,
    sy: u64,
}

impl<'v> HqSliceView<'v> {
    pub fn sx(&self) -> u64 {
        self.sx
    }

    pub fn sy(&self) -> u64 {
        self.sy
    }

    pub fn slice_index(&self) -> Result<u64> {
        let index = self.parameters.to_slice_index(self.sx, self.sy);
        if index < 0 {
            return Err(Error::IndexOutOfRange("slice index"));
        }
        Ok(index as u64)
    }

    pub fn prefix_bytes(&self) -> Result<Vec<u8>> {
        list_value(self.record, "prefix_bytes", self.slice_index()?)?
            .as_bytes()
            .map(<[u8]>::to_vec)
            .ok_or(Error::IndexOutOfRange("prefix_bytes"))
    }

    pub fn qindex(&self) -> Result<BigInt> {
        list_value(self.record, "qindex", self.slice_index()?)?
            .as_int()
            .cloned()
            .ok_or(Error::IndexOutOfRange("qindex"))
    }

    pub fn set_qindex(&mut self, value: BigInt) -> Result<()> {
        let index = self.slice_index()?;
        set_list_value(self.record, "qindex", index, Value::Int(value))
    }

    fn length_field(&self, key: &'static str) -> Result<u64> {
        list_value(self.record, key, self.slice_index()?)?
            .as_u64()
            .ok_or(Error::IndexOutOfRange("slice length"))
    }

    pub fn slice_y_length(&self) -> Result<u64> {
        self.length_field("slice_y_length")
    }

    pub fn slice_c1_length(&self) -> Result<u64> {
        self.length_field("slice_c1_length")
    }

    pub fn slice_c2_length(&self) -> Result<u64> {
        self.length_field("slice_c2_length")
    }

    fn padding_field(&self, key: &'static str) -> Result<Bits> {
        list_value(self.record, key, self.slice_index()?)?
            .as_bits()
            .cloned()
            .ok_or(Error::IndexOutOfRange("block padding"))
    }

    pub fn y_block_padding(&self) -> Result<Bits> {
        self.padding_field("y_block_padding")
    }

    pub fn c1_block_padding(&self) -> Result<Bits> {
        self.padding_field("c1_block_padding")
    }

    pub fn c2_block_padding(&self) -> Result<Bits> {
        self.padding_field("c2_block_padding")
    }

    /// (13.5.4) The total length of this slice in bits: the prefix bytes
    /// and qindex, then a length byte and scaled data block per component.
    pub fn length(&self) -> Result<u64> {
        let data_bytes = self.slice_size_scaler.saturating_mul(
            self.slice_y_length()?
                .saturating_add(self.slice_c1_length()?)
                .saturating_add(self.slice_c2_length()?),
        );
        Ok(8 * self
            .slice_prefix_bytes
            .saturating_add(1)
            .saturating_add(3)
            .saturating_add(data_bytes))
    }

    /// The length of the fields preceding the first component length
    /// field: the prefix bytes and the qindex byte.
    pub fn header_length(&self) -> u64 {
        8 * (self.slice_prefix_bytes + 1)
    }

    pub fn y_transform(&mut self) -> ComponentView<'_> {
        self.transform("y_transform", Component::Y)
    }

    pub fn c1_transform(&mut self) -> ComponentView<'_> {
        self.transform("c1_transform", Component::C1)
    }

    pub fn c2_transform(&mut self) -> ComponentView<'_> {
        self.transform("c2_transform", Component::C2)
    }

    fn transform(&mut self, key: &'static str, component: Component) -> ComponentView<'_> {
        ComponentView {
            record: &mut *self.record,
            parameters: self.parameters,
            key,
            component,
            stride: 1,
            phase: 0,
            sx: self.sx,
            sy: self.sy,
        }
    }
}
