//! JPEG header inspection: quantization tables, chroma subsampling and the
//! quality setting they imply.
//!
//! Only marker segments before the first scan are read; entropy-coded data is
//! never touched.

/// Maps the k-th coefficient in zigzag order to its natural (row-major) index.
const ZIGZAG_TO_NATURAL: [usize; 64] = [
    0, 1, 8, 16, 9, 2, 3, 10, 17, 24, 32, 25, 18, 11, 4, 5, 12, 19, 26, 33, 40, 48, 41, 34, 27,
    20, 13, 6, 7, 14, 21, 28, 35, 42, 49, 56, 57, 50, 43, 36, 29, 22, 15, 23, 30, 37, 44, 51, 58,
    59, 52, 45, 38, 31, 39, 46, 53, 60, 61, 54, 47, 55, 62, 63,
];

// Quality thresholds from ImageMagick's JPEG coder (coders/jpeg.c), indexed by quality - 1.
const HASH_LUMA_CHROMA: [u32; 101] = [
    1020, 1015, 932, 848, 780, 735, 702, 679, 660, 645, 632, 623, 613, 607, 600, 594, 589, 585,
    581, 571, 555, 542, 529, 514, 494, 474, 457, 439, 424, 410, 397, 386, 373, 364, 351, 341, 334,
    324, 317, 309, 299, 294, 287, 279, 274, 267, 262, 257, 251, 247, 243, 237, 232, 227, 222, 217,
    213, 207, 202, 198, 192, 188, 183, 177, 173, 168, 163, 157, 153, 148, 143, 139, 132, 128, 125,
    119, 115, 108, 104, 99, 94, 90, 84, 79, 74, 70, 64, 59, 55, 49, 45, 40, 34, 30, 25, 20, 15, 11,
    6, 4, 0,
];

const SUMS_LUMA_CHROMA: [u32; 101] = [
    32640, 32635, 32266, 31495, 30665, 29804, 29146, 28599, 28104, 27670, 27225, 26725, 26210,
    25716, 25240, 24789, 24373, 23946, 23572, 22846, 21801, 20842, 19949, 19121, 18386, 17651,
    16998, 16349, 15800, 15247, 14783, 14321, 13859, 13535, 13081, 12702, 12423, 12056, 11779,
    11513, 11135, 10955, 10676, 10392, 10208, 9928, 9747, 9564, 9369, 9193, 9017, 8822, 8639, 8458,
    8270, 8084, 7896, 7710, 7527, 7347, 7156, 6977, 6788, 6607, 6422, 6236, 6054, 5867, 5684, 5495,
    5305, 5128, 4945, 4751, 4638, 4442, 4248, 4065, 3888, 3698, 3509, 3326, 3139, 2957, 2775, 2586,
    2405, 2216, 2037, 1846, 1666, 1483, 1297, 1109, 927, 735, 554, 375, 201, 128, 0,
];

const HASH_LUMA: [u32; 101] = [
    510, 505, 422, 380, 355, 338, 326, 318, 311, 305, 300, 297, 293, 291, 288, 286, 284, 283, 281,
    280, 279, 278, 277, 273, 262, 251, 243, 233, 225, 218, 211, 205, 198, 193, 186, 181, 177, 172,
    168, 164, 158, 156, 152, 148, 145, 142, 139, 136, 133, 131, 129, 126, 123, 120, 118, 115, 113,
    110, 107, 105, 102, 100, 97, 94, 92, 89, 87, 83, 81, 79, 76, 74, 70, 68, 66, 63, 61, 57, 55,
    52, 50, 48, 44, 42, 39, 37, 34, 31, 29, 26, 24, 21, 18, 16, 13, 11, 8, 6, 3, 2, 0,
];

const SUMS_LUMA: [u32; 101] = [
    16320, 16315, 15946, 15277, 14655, 14073, 13623, 13230, 12859, 12560, 12240, 11861, 11456,
    11081, 10714, 10360, 10027, 9679, 9368, 9056, 8680, 8331, 7995, 7668, 7376, 7084, 6823, 6562,
    6345, 6125, 5939, 5756, 5571, 5421, 5240, 5086, 4976, 4829, 4719, 4616, 4463, 4393, 4280, 4166,
    4092, 3980, 3909, 3835, 3755, 3688, 3621, 3541, 3467, 3396, 3323, 3247, 3170, 3096, 3021, 2952,
    2874, 2804, 2727, 2657, 2583, 2509, 2437, 2362, 2290, 2211, 2136, 2068, 1996, 1915, 1858, 1773,
    1692, 1620, 1552, 1477, 1398, 1326, 1251, 1179, 1109, 1031, 961, 884, 814, 736, 667, 592, 518,
    441, 369, 292, 221, 151, 86, 64, 0,
];

/// Chroma subsampling of a three-component JPEG, read from the luma sampling factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subsampling {
    /// 4:4:4
    None,
    /// 4:2:2
    Horizontal,
    /// 4:2:0
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Component {
    h: u8,
    v: u8,
}

/// Header state needed to reproduce a JPEG's encoding parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JpegHeader {
    /// Quantization tables by destination slot, in natural order.
    tables: [Option<[u16; 64]>; 4],
    components: Vec<Component>,
}

impl JpegHeader {
    /// Reads markers up to the first scan. Returns `None` if `data` is not a JPEG stream.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.get(..2)? != [0xFF, 0xD8] {
            return None;
        }

        let mut header = JpegHeader::default();
        let mut pos = 2;
        loop {
            // Markers may be preceded by any number of 0xFF fill bytes.
            while *data.get(pos)? != 0xFF {
                pos += 1;
            }
            while *data.get(pos)? == 0xFF {
                pos += 1;
            }
            let marker = *data.get(pos)?;
            pos += 1;

            match marker {
                0xD9 | 0xDA => break,
                0x01 | 0xD0..=0xD7 => continue,
                _ => {}
            }

            let len = u16::from_be_bytes([*data.get(pos)?, *data.get(pos + 1)?]) as usize;
            if len < 2 {
                return None;
            }
            let segment = data.get(pos + 2..pos + len)?;
            match marker {
                0xDB => header.read_dqt(segment)?,
                0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => header.read_sof(segment)?,
                _ => {}
            }
            pos += len;
        }
        Some(header)
    }

    fn read_dqt(&mut self, mut segment: &[u8]) -> Option<()> {
        while let Some((&pq_tq, rest)) = segment.split_first() {
            let wide = pq_tq >> 4 != 0;
            let slot = (pq_tq & 0x0F) as usize;
            let width = if wide { 2 } else { 1 };
            let body = rest.get(..64 * width)?;

            let mut table = [0u16; 64];
            for (k, &natural) in ZIGZAG_TO_NATURAL.iter().enumerate() {
                table[natural] = if wide {
                    u16::from_be_bytes([body[2 * k], body[2 * k + 1]])
                } else {
                    u16::from(body[k])
                };
            }
            *self.tables.get_mut(slot)? = Some(table);
            segment = &rest[64 * width..];
        }
        Some(())
    }

    fn read_sof(&mut self, segment: &[u8]) -> Option<()> {
        let count = *segment.get(5)? as usize;
        self.components = (0..count)
            .map(|i| {
                let sampling = *segment.get(6 + i * 3 + 1)?;
                Some(Component {
                    h: sampling >> 4,
                    v: sampling & 0x0F,
                })
            })
            .collect::<Option<Vec<_>>>()?;
        Some(())
    }

    pub fn table_count(&self) -> usize {
        self.tables.iter().flatten().count()
    }

    /// Estimates the quality (1..=100) the image was saved with, using
    /// ImageMagick's heuristic. `None` when no usable table is present.
    pub fn estimate_quality(&self) -> Option<u8> {
        let luma = self.tables[0]?;
        let qsum: u32 = self
            .tables
            .iter()
            .flatten()
            .flat_map(|t| t.iter())
            .map(|&q| u32::from(q))
            .sum();

        let mut qvalue = u32::from(luma[2]) + u32::from(luma[53]);
        let (hash, sums) = match self.tables[1] {
            Some(chroma) => {
                qvalue += u32::from(chroma[0]) + u32::from(chroma[63]);
                (&HASH_LUMA_CHROMA, &SUMS_LUMA_CHROMA)
            }
            None => (&HASH_LUMA, &SUMS_LUMA),
        };

        for i in 0..100 {
            if qvalue < hash[i] && qsum < sums[i] {
                continue;
            }
            if (qvalue <= hash[i] && qsum <= sums[i]) || i >= 50 {
                return Some((i + 1) as u8);
            }
            break;
        }
        None
    }

    /// Chroma subsampling, known only for three-component images.
    pub fn subsampling(&self) -> Option<Subsampling> {
        if self.components.len() != 3 {
            return None;
        }
        match (self.components[0].h, self.components[0].v) {
            (1, 1) => Some(Subsampling::None),
            (2, 1) => Some(Subsampling::Horizontal),
            (2, 2) => Some(Subsampling::Both),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// SOI + one 8-bit DQT segment per table + SOF0 + EOI.
    fn synthetic_jpeg(tables: &[(u8, [u8; 64])], luma_sampling: u8) -> Vec<u8> {
        let mut data = vec![0xFF, 0xD8];
        for (slot, table) in tables {
            data.extend_from_slice(&[0xFF, 0xDB, 0x00, 67, *slot]);
            data.extend_from_slice(table);
        }
        data.extend_from_slice(&[0xFF, 0xC0, 0x00, 17, 8, 0x00, 0x10, 0x00, 0x10, 3]);
        data.extend_from_slice(&[1, luma_sampling, 0, 2, 0x11, 1, 3, 0x11, 1]);
        data.extend_from_slice(&[0xFF, 0xD9]);
        data
    }

    #[test]
    fn test_all_ones_tables_estimate_maximum_quality() {
        let luma_only = JpegHeader::parse(&synthetic_jpeg(&[(0, [1; 64])], 0x11)).unwrap();
        assert_eq!(luma_only.table_count(), 1);
        assert_eq!(luma_only.estimate_quality(), Some(100));

        let both = JpegHeader::parse(&synthetic_jpeg(&[(0, [1; 64]), (1, [1; 64])], 0x22)).unwrap();
        assert_eq!(both.table_count(), 2);
        assert_eq!(both.estimate_quality(), Some(100));
        assert_eq!(both.subsampling(), Some(Subsampling::Both));
    }

    #[test]
    fn test_zigzag_storage_is_converted() {
        let mut zigzag = [0u8; 64];
        for (k, v) in zigzag.iter_mut().enumerate() {
            *v = k as u8;
        }
        let header = JpegHeader::parse(&synthetic_jpeg(&[(0, zigzag)], 0x21)).unwrap();
        let luma = header.tables[0].unwrap();
        // Natural index 8 is the third coefficient in zigzag order.
        assert_eq!(luma[8], 2);
        assert_eq!(luma[2], 5);
        assert_eq!(header.subsampling(), Some(Subsampling::Horizontal));
    }

    #[test]
    fn test_encoded_quality_is_recovered() {
        let pixels: Vec<u8> = (0..32 * 32 * 3).map(|i| (i % 251) as u8).collect();
        for quality in [50u8, 75, 90] {
            let mut out = Vec::new();
            let encoder = jpeg_encoder::Encoder::new(&mut out, quality);
            encoder
                .encode(&pixels, 32, 32, jpeg_encoder::ColorType::Rgb)
                .unwrap();
            let estimated = JpegHeader::parse(&out).unwrap().estimate_quality().unwrap();
            assert!(
                estimated.abs_diff(quality) <= 2,
                "encoded at {} estimated {}",
                quality,
                estimated
            );
        }
    }

    #[test]
    fn test_non_jpeg_is_rejected() {
        assert!(JpegHeader::parse(b"\x89PNG\r\n\x1a\n").is_none());
        assert!(JpegHeader::parse(&[0xFF, 0xD8, 0xFF]).is_none());
        assert_eq!(JpegHeader::default().estimate_quality(), None);
    }
}
