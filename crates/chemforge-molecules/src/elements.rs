//! Periodic-table data needed for validation, descriptors and geometry.

use serde::{Deserialize, Serialize};
use std::fmt;

struct ElementData {
    number: u8,
    symbol: &'static str,
    /// Standard atomic weight (used for average molecular weight).
    average_mass: f64,
    /// Mass of the most abundant isotope (used for exact mass).
    monoisotopic_mass: f64,
    /// Single-bond covalent radius in Å.
    covalent_radius: f64,
    /// Van der Waals radius in Å.
    vdw_radius: f64,
}

const fn el(
    number: u8,
    symbol: &'static str,
    average_mass: f64,
    monoisotopic_mass: f64,
    covalent_radius: f64,
    vdw_radius: f64,
) -> ElementData {
    ElementData { number, symbol, average_mass, monoisotopic_mass, covalent_radius, vdw_radius }
}

// Sorted by atomic number, H through U.
static ELEMENTS: &[ElementData] = &[
    el(1,  "H",  1.008,   1.007_825_03, 0.31, 1.20),
    el(2,  "He", 4.0026,  4.002_603_25, 0.28, 1.40),
    el(3,  "Li", 6.94,    7.016_003_4,  1.28, 1.82),
    el(4,  "Be", 9.0122,  9.012_183_1,  0.96, 1.53),
    el(5,  "B",  10.81,   11.009_305_4, 0.84, 1.92),
    el(6,  "C",  12.011,  12.0,         0.76, 1.70),
    el(7,  "N",  14.007,  14.003_074_0, 0.71, 1.55),
    el(8,  "O",  15.999,  15.994_914_6, 0.66, 1.52),
    el(9,  "F",  18.998,  18.998_403_2, 0.57, 1.47),
    el(10, "Ne", 20.180,  19.992_440_2, 0.58, 1.54),
    el(11, "Na", 22.990,  22.989_769_3, 1.66, 2.27),
    el(12, "Mg", 24.305,  23.985_041_7, 1.41, 1.73),
    el(13, "Al", 26.982,  26.981_538_5, 1.21, 1.84),
    el(14, "Si", 28.085,  27.976_926_5, 1.11, 2.10),
    el(15, "P",  30.974,  30.973_762_0, 1.07, 1.80),
    el(16, "S",  32.06,   31.972_071_1, 1.05, 1.80),
    el(17, "Cl", 35.45,   34.968_852_7, 1.02, 1.75),
    el(18, "Ar", 39.948,  39.962_383_1, 1.06, 1.88),
    el(19, "K",  39.098,  38.963_706_5, 2.03, 2.75),
    el(20, "Ca", 40.078,  39.962_590_9, 1.76, 2.31),
    el(21, "Sc", 44.956,  44.955_908,   1.70, 2.15),
    el(22, "Ti", 47.867,  47.947_942,   1.60, 2.11),
    el(23, "V",  50.942,  50.943_957,   1.53, 2.07),
    el(24, "Cr", 51.996,  51.940_506,   1.39, 2.06),
    el(25, "Mn", 54.938,  54.938_043_9, 1.39, 2.00),
    el(26, "Fe", 55.845,  55.934_936_3, 1.32, 2.00),
    el(27, "Co", 58.933,  58.933_194_3, 1.26, 2.00),
    el(28, "Ni", 58.693,  57.935_342_4, 1.24, 1.63),
    el(29, "Cu", 63.546,  62.929_597_7, 1.32, 1.40),
    el(30, "Zn", 65.38,   63.929_142_0, 1.22, 1.39),
    el(31, "Ga", 69.723,  68.925_574,   1.22, 1.87),
    el(32, "Ge", 72.630,  73.921_178,   1.20, 2.11),
    el(33, "As", 74.922,  74.921_594_5, 1.19, 1.85),
    el(34, "Se", 78.971,  79.916_521_8, 1.20, 1.90),
    el(35, "Br", 79.904,  78.918_337_6, 1.20, 1.85),
    el(36, "Kr", 83.798,  83.911_498,   1.16, 2.02),
    el(37, "Rb", 85.468,  84.911_790,   2.20, 3.03),
    el(38, "Sr", 87.62,   87.905_613,   1.95, 2.49),
    el(39, "Y",  88.906,  88.905_840,   1.90, 2.32),
    el(40, "Zr", 91.224,  89.904_698,   1.75, 2.23),
    el(41, "Nb", 92.906,  92.906_373,   1.64, 2.18),
    el(42, "Mo", 95.95,   97.905_405,   1.54, 2.17),
    el(43, "Tc", 98.0,    97.907_212,   1.47, 2.16),
    el(44, "Ru", 101.07,  101.904_344,  1.46, 2.13),
    el(45, "Rh", 102.91,  102.905_498,  1.42, 2.10),
    el(46, "Pd", 106.42,  105.903_480,  1.39, 1.63),
    el(47, "Ag", 107.87,  106.905_095,  1.45, 1.72),
    el(48, "Cd", 112.41,  113.903_365,  1.44, 1.58),
    el(49, "In", 114.82,  114.903_879,  1.42, 1.93),
    el(50, "Sn", 118.71,  119.902_199,  1.39, 2.17),
    el(51, "Sb", 121.76,  120.903_812,  1.39, 2.06),
    el(52, "Te", 127.60,  129.906_222,  1.38, 2.06),
    el(53, "I",  126.90,  126.904_472,  1.39, 1.98),
    el(54, "Xe", 131.29,  131.904_155,  1.40, 2.16),
    el(55, "Cs", 132.91,  132.905_452,  2.44, 3.43),
    el(56, "Ba", 137.33,  137.905_247,  2.15, 2.68),
    el(57, "La", 138.91,  138.906_356,  2.07, 2.43),
    el(58, "Ce", 140.12,  139.905_443,  2.04, 2.42),
    el(59, "Pr", 140.91,  140.907_658,  2.03, 2.40),
    el(60, "Nd", 144.24,  141.907_729,  2.01, 2.39),
    el(61, "Pm", 145.0,   144.912_756,  1.99, 2.38),
    el(62, "Sm", 150.36,  151.919_740,  1.98, 2.36),
    el(63, "Eu", 151.96,  152.921_238,  1.98, 2.35),
    el(64, "Gd", 157.25,  157.924_112,  1.96, 2.34),
    el(65, "Tb", 158.93,  158.925_355,  1.94, 2.33),
    el(66, "Dy", 162.50,  163.929_182,  1.92, 2.31),
    el(67, "Ho", 164.93,  164.930_329,  1.92, 2.30),
    el(68, "Er", 167.26,  165.930_300,  1.89, 2.29),
    el(69, "Tm", 168.93,  168.934_218,  1.90, 2.27),
    el(70, "Yb", 173.05,  173.938_866,  1.87, 2.26),
    el(71, "Lu", 174.97,  174.940_777,  1.87, 2.24),
    el(72, "Hf", 178.49,  179.946_557,  1.75, 2.23),
    el(73, "Ta", 180.95,  180.947_999,  1.70, 2.22),
    el(74, "W",  183.84,  183.950_933,  1.62, 2.18),
    el(75, "Re", 186.21,  186.955_752,  1.51, 2.16),
    el(76, "Os", 190.23,  191.961_477,  1.44, 2.16),
    el(77, "Ir", 192.22,  192.962_922,  1.41, 2.13),
    el(78, "Pt", 195.08,  194.964_791,  1.36, 1.75),
    el(79, "Au", 196.97,  196.966_569,  1.36, 1.66),
    el(80, "Hg", 200.59,  201.970_643,  1.32, 1.55),
    el(81, "Tl", 204.38,  204.974_427,  1.45, 1.96),
    el(82, "Pb", 207.2,   207.976_652,  1.46, 2.02),
    el(83, "Bi", 208.98,  208.980_399,  1.48, 2.07),
    el(84, "Po", 209.0,   208.982_430,  1.40, 1.97),
    el(85, "At", 210.0,   209.987_148,  1.50, 2.02),
    el(86, "Rn", 222.0,   222.017_578,  1.50, 2.20),
    el(87, "Fr", 223.0,   223.019_736,  2.60, 3.48),
    el(88, "Ra", 226.0,   226.025_410,  2.21, 2.83),
    el(89, "Ac", 227.0,   227.027_752,  2.15, 2.47),
    el(90, "Th", 232.04,  232.038_056,  2.06, 2.45),
    el(91, "Pa", 231.04,  231.035_884,  2.00, 2.43),
    el(92, "U",  238.03,  238.050_788,  1.96, 1.86),
];

/// Exact masses of the isotopes commonly written in labelled SMILES.
static ISOTOPES: &[(u8, u16, f64)] = &[
    (1, 1, 1.007_825_03),
    (1, 2, 2.014_101_78),
    (1, 3, 3.016_049_28),
    (6, 11, 11.011_433_6),
    (6, 12, 12.0),
    (6, 13, 13.003_354_8),
    (6, 14, 14.003_242_0),
    (7, 14, 14.003_074_0),
    (7, 15, 15.000_108_9),
    (8, 16, 15.994_914_6),
    (8, 17, 16.999_131_8),
    (8, 18, 17.999_159_6),
    (9, 18, 18.000_938_0),
    (9, 19, 18.998_403_2),
    (15, 31, 30.973_762_0),
    (15, 32, 31.973_907_6),
    (15, 33, 32.971_725_7),
    (16, 32, 31.972_071_1),
    (16, 33, 32.971_458_9),
    (16, 34, 33.967_867_0),
    (16, 35, 34.969_032_3),
    (17, 35, 34.968_852_7),
    (17, 36, 35.968_306_8),
    (17, 37, 36.965_902_6),
    (35, 79, 78.918_337_6),
    (35, 81, 80.916_290_6),
    (53, 123, 122.905_589),
    (53, 124, 123.906_209),
    (53, 125, 124.904_630),
    (53, 127, 126.904_472),
    (53, 131, 130.906_126),
];

/// A chemical element, identified by atomic number.
///
/// Only elements present in the internal table can be constructed, so every
/// accessor is infallible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Element(u8);

impl Element {
    pub const H: Element = Element(1);
    pub const B: Element = Element(5);
    pub const C: Element = Element(6);
    pub const N: Element = Element(7);
    pub const O: Element = Element(8);
    pub const F: Element = Element(9);
    pub const P: Element = Element(15);
    pub const S: Element = Element(16);
    pub const CL: Element = Element(17);
    pub const BR: Element = Element(35);
    pub const I: Element = Element(53);

    /// Look up an element by its case-sensitive symbol ("Cl", not "CL").
    pub fn from_symbol(symbol: &str) -> Option<Element> {
        ELEMENTS.iter().find(|e| e.symbol == symbol).map(|e| Element(e.number))
    }

    pub fn from_atomic_number(number: u8) -> Option<Element> {
        ELEMENTS
            .binary_search_by_key(&number, |e| e.number)
            .ok()
            .map(|_| Element(number))
    }

    fn data(self) -> &'static ElementData {
        let idx = ELEMENTS
            .binary_search_by_key(&self.0, |e| e.number)
            .unwrap_or_else(|_| unreachable!("Element constructed outside the table"));
        &ELEMENTS[idx]
    }

    pub fn atomic_number(self) -> u8 {
        self.0
    }

    pub fn symbol(self) -> &'static str {
        self.data().symbol
    }

    pub fn average_mass(self) -> f64 {
        self.data().average_mass
    }

    pub fn monoisotopic_mass(self) -> f64 {
        self.data().monoisotopic_mass
    }

    /// Exact mass of the isotope with `mass_number` nucleons. Isotopes
    /// outside the table are approximated by their mass number.
    pub fn isotope_mass(self, mass_number: u16) -> f64 {
        ISOTOPES
            .iter()
            .find(|&&(z, a, _)| z == self.0 && a == mass_number)
            .map(|&(_, _, mass)| mass)
            .unwrap_or(mass_number as f64)
    }

    pub fn covalent_radius(self) -> f64 {
        self.data().covalent_radius
    }

    pub fn vdw_radius(self) -> f64 {
        self.data().vdw_radius
    }

    pub fn is_hydrogen(self) -> bool {
        self.0 == 1
    }

    /// Member of the SMILES organic subset (may be written without brackets).
    pub fn is_organic_subset(self) -> bool {
        matches!(self.0, 5 | 6 | 7 | 8 | 9 | 15 | 16 | 17 | 35 | 53)
    }

    /// Allowed valences, lowest first, for a neutral atom. Empty for
    /// elements without a SMILES default valence.
    pub fn default_valences(self) -> &'static [u8] {
        match self.0 {
            1 => &[1],
            5 => &[3],
            6 => &[4],
            7 | 15 | 33 => &[3, 5],
            8 => &[2],
            16 | 34 => &[2, 4, 6],
            9 | 17 | 35 | 53 => &[1],
            _ => &[],
        }
    }

    /// Lowest valence after adjusting for a formal charge: N⁺ and O⁺ gain a
    /// bond, C± and N⁻ lose one, B⁻ gains one.
    pub fn charged_valence(self, charge: i8) -> Option<u8> {
        let base = *self.default_valences().first()? as i16;
        let adjusted = match self.0 {
            6 => base - charge.abs() as i16,
            5 => base - charge as i16,
            _ => base + charge as i16,
        };
        u8::try_from(adjusted).ok()
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl TryFrom<String> for Element {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Element::from_symbol(&value).ok_or_else(|| format!("unknown element symbol '{}'", value))
    }
}

impl From<Element> for String {
    fn from(value: Element) -> Self {
        value.symbol().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_sorted() {
        assert!(ELEMENTS.windows(2).all(|w| w[0].number < w[1].number));
    }

    #[test]
    fn test_symbol_lookup() {
        assert_eq!(Element::from_symbol("Cl"), Some(Element::CL));
        assert_eq!(Element::from_symbol("CL"), None);
        assert_eq!(Element::from_symbol("Xx"), None);
        assert_eq!(Element::C.symbol(), "C");
        assert_eq!(Element::from_atomic_number(26).map(|e| e.symbol()), Some("Fe"));
    }

    #[test]
    fn test_table_covers_h_through_u() {
        for z in 1..=92u8 {
            let element = Element::from_atomic_number(z).unwrap();
            assert_eq!(Element::from_symbol(element.symbol()), Some(element));
            assert!(element.average_mass() > 0.0);
            assert!(element.covalent_radius() > 0.0 && element.vdw_radius() > 0.0);
        }
        assert_eq!(Element::from_atomic_number(93), None);
        for symbol in ["Pd", "Ti", "Cs", "Ba", "Gd", "Cr", "U", "W", "V"] {
            assert!(Element::from_symbol(symbol).is_some(), "{}", symbol);
        }
    }

    #[test]
    fn test_isotope_mass() {
        assert!((Element::C.isotope_mass(13) - 13.003_354_8).abs() < 1e-6);
        assert!((Element::H.isotope_mass(2) - 2.014_101_78).abs() < 1e-6);
        assert_eq!(Element::C.isotope_mass(12), 12.0);
        assert_eq!(Element::from_symbol("Fe").unwrap().isotope_mass(57), 57.0);
    }

    #[test]
    fn test_charged_valence() {
        assert_eq!(Element::N.charged_valence(1), Some(4));
        assert_eq!(Element::O.charged_valence(-1), Some(1));
        assert_eq!(Element::C.charged_valence(-1), Some(3));
        assert_eq!(Element::B.charged_valence(-1), Some(4));
        assert_eq!(Element::from_symbol("Fe").unwrap().charged_valence(2), None);
    }
}
