//! PCL XL operator, attribute and data type tables

use std::collections::HashMap;

#[rustfmt::skip]
static OPERATORS: &[(u8, &str)] = &[
    (0x41, "BeginSession"), (0x42, "EndSession"), (0x43, "BeginPage"), (0x44, "EndPage"),
    (0x46, "VendorUnique"), (0x47, "Comment"), (0x48, "OpenDataSource"), (0x49, "CloseDataSource"),
    (0x4A, "EchoComment"), (0x4B, "Query"), (0x4C, "Diagnostic3"),
    (0x4F, "BeginFontHeader"), (0x50, "ReadFontHeader"), (0x51, "EndFontHeader"),
    (0x52, "BeginChar"), (0x53, "ReadChar"), (0x54, "EndChar"), (0x55, "RemoveFont"),
    (0x56, "SetCharAttributes"), (0x57, "SetDefaultGS"), (0x58, "SetColorTreatment"),
    (0x59, "SetGlobalAttributes"), (0x5A, "ClearGlobalAttributes"),
    (0x5B, "BeginStream"), (0x5C, "ReadStream"), (0x5D, "EndStream"), (0x5E, "ExecStream"), (0x5F, "RemoveStream"),
    (0x60, "PopGS"), (0x61, "PushGS"), (0x62, "SetClipReplace"), (0x63, "SetBrushSource"),
    (0x64, "SetCharAngle"), (0x65, "SetCharScale"), (0x66, "SetCharShear"), (0x67, "SetClipIntersect"),
    (0x68, "SetClipRectangle"), (0x69, "SetClipToPage"), (0x6A, "SetColorSpace"), (0x6B, "SetCursor"),
    (0x6C, "SetCursorRel"), (0x6D, "SetHalftoneMethod"), (0x6E, "SetFillMode"), (0x6F, "SetFont"),
    (0x70, "SetLineDash"), (0x71, "SetLineCap"), (0x72, "SetLineJoin"), (0x73, "SetMiterLimit"),
    (0x74, "SetPageDefaultCTM"), (0x75, "SetPageOrigin"), (0x76, "SetPageRotation"), (0x77, "SetPageScale"),
    (0x78, "SetPatternTxMode"), (0x79, "SetPenSource"), (0x7A, "SetPenWidth"), (0x7B, "SetROP"),
    (0x7C, "SetSourceTxMode"), (0x7D, "SetCharBoldValue"), (0x7E, "SetNeutralAxis"), (0x7F, "SetClipMode"),
    (0x80, "SetPathToClip"), (0x81, "SetCharSubMode"), (0x82, "BeginUserDefinedLineCap"), (0x83, "EndUserDefinedLineCap"),
    (0x84, "CloseSubPath"), (0x85, "NewPath"), (0x86, "PaintPath"),
    (0x91, "ArcPath"), (0x92, "SetColorTrapping"), (0x93, "BezierPath"), (0x94, "SetAdaptiveHalftoning"),
    (0x95, "BezierRelPath"), (0x96, "Chord"), (0x97, "ChordPath"), (0x98, "Ellipse"), (0x99, "EllipsePath"),
    (0x9B, "LinePath"), (0x9D, "LineRelPath"), (0x9E, "Pie"), (0x9F, "PiePath"),
    (0xA0, "Rectangle"), (0xA1, "RectanglePath"), (0xA2, "RoundRectangle"), (0xA3, "RoundRectanglePath"),
    (0xA8, "Text"), (0xA9, "TextPath"),
    (0xB0, "BeginImage"), (0xB1, "ReadImage"), (0xB2, "EndImage"),
    (0xB3, "BeginRastPattern"), (0xB4, "ReadRastPattern"), (0xB5, "EndRastPattern"),
    (0xB6, "BeginScan"), (0xB8, "EndScan"), (0xB9, "ScanLineRel"),
    (0xBF, "PassThrough"),
];

#[rustfmt::skip]
static ATTRIBUTES: &[(u16, &str)] = &[
    (2, "PaletteDepth"), (3, "ColorSpace"), (4, "NullBrush"), (5, "NullPen"), (6, "PaletteData"),
    (8, "PatternSelectID"), (9, "GrayLevel"), (11, "RGBColor"), (12, "PatternOrigin"), (13, "NewDestinationSize"),
    (14, "PrimaryArray"), (15, "PrimaryDepth"), (17, "ColorimetricColorSpace"), (18, "XYChromaticities"),
    (19, "WhitePointReference"), (20, "CRGBMinMax"), (21, "GammaGain"),
    (29, "AllObjectTypes"), (30, "TextObjects"), (31, "VectorObjects"), (32, "RasterObjects"),
    (33, "DeviceMatrix"), (34, "DitherMatrixDataType"), (35, "DitherOrigin"), (36, "MediaDestination"),
    (37, "MediaSize"), (38, "MediaSource"), (39, "MediaType"), (40, "Orientation"), (41, "PageAngle"),
    (42, "PageOrigin"), (43, "PageScale"), (44, "ROP3"), (45, "TxMode"), (47, "CustomMediaSize"),
    (48, "CustomMediaSizeUnits"), (49, "PageCopies"), (50, "DitherMatrixSize"), (51, "DitherMatrixDepth"),
    (52, "SimplexPageMode"), (53, "DuplexPageMode"), (54, "DuplexPageSide"),
    (65, "ArcDirection"), (66, "BoundingBox"), (67, "DashOffset"), (68, "EllipseDimension"), (69, "EndPoint"),
    (70, "FillMode"), (71, "LineCapStyle"), (72, "LineJoinStyle"), (73, "MiterLength"), (74, "LineDashStyle"),
    (75, "PenWidth"), (76, "Point"), (77, "NumberOfPoints"), (78, "SolidLine"), (79, "StartPoint"),
    (80, "PointType"), (81, "ControlPoint1"), (82, "ControlPoint2"), (83, "ClipRegion"), (84, "ClipMode"),
    (98, "ColorDepth"), (99, "BlockHeight"), (100, "ColorMapping"), (101, "CompressMode"), (102, "DestinationBox"),
    (103, "DestinationSize"), (104, "PatternPersistence"), (105, "PatternDefineID"), (107, "SourceHeight"),
    (108, "SourceWidth"), (109, "StartLine"), (110, "PadBytesMultiple"), (111, "BlockByteLength"),
    (115, "NumberOfScanLines"), (120, "ColorTreatment"), (121, "FileName"),
    (129, "CommentData"), (130, "DataOrg"), (134, "Measure"), (136, "SourceType"), (137, "UnitsPerMeasure"),
    (138, "QueryKey"), (139, "StreamName"), (140, "StreamDataLength"), (143, "ErrorReport"), (145, "IOReadTimeOut"),
    (161, "CharAngle"), (162, "CharCode"), (163, "CharDataSize"), (164, "CharScale"), (165, "CharShear"),
    (166, "CharSize"), (167, "FontHeaderLength"), (168, "FontName"), (169, "FontFormat"), (170, "SymbolSet"),
    (171, "TextData"), (172, "CharSubModeArray"), (173, "WritingMode"), (175, "XSpacingData"),
    (176, "YSpacingData"), (177, "CharBoldValue"),
];

lazy_static::lazy_static! {
    static ref OPERATOR_LUT: [Option<&'static str>; 256] = {
        let mut lut = [None; 256];
        for (op, name) in OPERATORS {
            lut[*op as usize] = Some(*name);
        }
        lut
    };

    static ref ATTRIBUTE_LUT: HashMap<u16, &'static str> = ATTRIBUTES.iter().copied().collect();
}

pub fn operator_name(op: u8) -> Option<&'static str> {
    OPERATOR_LUT[op as usize]
}

pub fn attribute_name(id: u16) -> Option<&'static str> {
    ATTRIBUTE_LUT.get(&id).copied()
}

/// Element type of a data value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Element {
    UByte,
    UInt16,
    UInt32,
    SInt16,
    SInt32,
    Real32,
}

impl Element {
    pub fn size(&self) -> usize {
        match self {
            Self::UByte => 1,
            Self::UInt16 | Self::SInt16 => 2,
            Self::UInt32 | Self::SInt32 | Self::Real32 => 4,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::UByte => "ubyte",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::SInt16 => "sint16",
            Self::SInt32 => "sint32",
            Self::Real32 => "real32",
        }
    }

    fn from_low_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Self::UByte),
            1 => Some(Self::UInt16),
            2 => Some(Self::UInt32),
            3 => Some(Self::SInt16),
            4 => Some(Self::SInt32),
            5 => Some(Self::Real32),
            _ => None,
        }
    }
}

/// Shape of a data value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Scalar,
    Array,
    Xy,
    Box,
}

/// Decodes a data type tag (0xC0..=0xC5, 0xC8..=0xCD, 0xD0..=0xD5, 0xE0..=0xE5).
pub fn data_type(tag: u8) -> Option<(Shape, Element)> {
    let shape = match tag & 0xF8 {
        0xC0 => Shape::Scalar,
        0xC8 => Shape::Array,
        0xD0 => Shape::Xy,
        0xE0 => Shape::Box,
        _ => return None,
    };
    Element::from_low_bits(tag & 0x07).map(|e| (shape, e))
}
