use std::fmt::{Display, Formatter};

use crate::errors::{GeoError, Result};

/// Broad kind of a coordinate reference system.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CrsKind {
    Geographic,
    Projected,
    Unknown,
}

/// A coordinate reference system.
///
/// A `SpatialRef` keeps the definition it was built from (as WKT) together with
/// the authority code, when one is known. Two references compare equal when they
/// share an authority code, or when their WKT strings are identical.
#[derive(Clone, Debug)]
pub struct SpatialRef {
    name: String,
    kind: CrsKind,
    authority: Option<(String, u32)>,
    wkt: String,
}

const WGS84_DATUM: &str = r#"DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]]"#;
const DEGREE_UNIT: &str = r#"UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]]"#;
const METRE_UNIT: &str = r#"UNIT["metre",1,AUTHORITY["EPSG","9001"]]"#;

fn wgs84_geogcs() -> String {
    format!(
        r#"GEOGCS["WGS 84",{WGS84_DATUM},PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],{DEGREE_UNIT},AUTHORITY["EPSG","4326"]]"#
    )
}

fn geographic_wkt(name: &str, datum: &str, spheroid: &str, code: u32) -> String {
    format!(
        r#"GEOGCS["{name}",DATUM["{datum}",{spheroid}],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],{DEGREE_UNIT},AUTHORITY["EPSG","{code}"]]"#
    )
}

fn utm_wkt(zone: u32, north: bool, code: u32) -> String {
    let hemisphere = if north { "N" } else { "S" };
    let false_northing = if north { 0 } else { 10_000_000 };
    let central_meridian = zone as i32 * 6 - 183;
    format!(
        r#"PROJCS["WGS 84 / UTM zone {zone}{hemisphere}",{},PROJECTION["Transverse_Mercator"],PARAMETER["latitude_of_origin",0],PARAMETER["central_meridian",{central_meridian}],PARAMETER["scale_factor",0.9996],PARAMETER["false_easting",500000],PARAMETER["false_northing",{false_northing}],{METRE_UNIT},AXIS["Easting",EAST],AXIS["Northing",NORTH],AUTHORITY["EPSG","{code}"]]"#,
        wgs84_geogcs()
    )
}

/// Built-in EPSG registry: name, kind and WKT of the codes known to this crate.
fn lookup_epsg(code: u32) -> Option<(String, CrsKind, String)> {
    match code {
        4326 => Some(("WGS 84".into(), CrsKind::Geographic, wgs84_geogcs())),
        4258 => Some((
            "ETRS89".into(),
            CrsKind::Geographic,
            geographic_wkt(
                "ETRS89",
                "European_Terrestrial_Reference_System_1989",
                r#"SPHEROID["GRS 1980",6378137,298.257222101,AUTHORITY["EPSG","7019"]]"#,
                4258,
            ),
        )),
        4269 => Some((
            "NAD83".into(),
            CrsKind::Geographic,
            geographic_wkt(
                "NAD83",
                "North_American_Datum_1983",
                r#"SPHEROID["GRS 1980",6378137,298.257222101,AUTHORITY["EPSG","7019"]]"#,
                4269,
            ),
        )),
        3857 => Some((
            "WGS 84 / Pseudo-Mercator".into(),
            CrsKind::Projected,
            format!(
                r#"PROJCS["WGS 84 / Pseudo-Mercator",{},PROJECTION["Mercator_1SP"],PARAMETER["central_meridian",0],PARAMETER["scale_factor",1],PARAMETER["false_easting",0],PARAMETER["false_northing",0],{METRE_UNIT},AXIS["Easting",EAST],AXIS["Northing",NORTH],EXTENSION["PROJ4","+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +nadgrids=@null +wktext +no_defs"],AUTHORITY["EPSG","3857"]]"#,
                wgs84_geogcs()
            ),
        )),
        32601..=32660 => {
            let zone = code - 32600;
            Some((
                format!("WGS 84 / UTM zone {zone}N"),
                CrsKind::Projected,
                utm_wkt(zone, true, code),
            ))
        }
        32701..=32760 => {
            let zone = code - 32700;
            Some((
                format!("WGS 84 / UTM zone {zone}S"),
                CrsKind::Projected,
                utm_wkt(zone, false, code),
            ))
        }
        _ => None,
    }
}

impl SpatialRef {
    /// Build a reference from an EPSG code of the built-in registry.
    pub fn from_epsg(epsg_code: u32) -> Result<SpatialRef> {
        let (name, kind, wkt) = lookup_epsg(epsg_code).ok_or_else(|| {
            GeoError::BadArgument(format!(
                "EPSG:{epsg_code} is not in the built-in registry"
            ))
        })?;
        Ok(SpatialRef {
            name,
            kind,
            authority: Some(("EPSG".to_string(), epsg_code)),
            wkt,
        })
    }

    /// Parse a WKT1 or WKT2 definition.
    ///
    /// Only the top-level name, kind and authority code are interpreted; the
    /// definition itself is kept verbatim.
    pub fn from_wkt(wkt: &str) -> Result<SpatialRef> {
        let wkt = wkt.trim();
        let open = wkt
            .find('[')
            .ok_or_else(|| GeoError::BadArgument(format!("invalid WKT: '{wkt}'")))?;
        if !wkt.ends_with(']') {
            return Err(GeoError::BadArgument(format!("invalid WKT: '{wkt}'")));
        }
        let keyword = wkt[..open].trim().to_ascii_uppercase();
        let kind = match keyword.as_str() {
            "GEOGCS" | "GEOGCRS" | "GEODCRS" | "GEOGRAPHICCRS" => CrsKind::Geographic,
            "PROJCS" | "PROJCRS" | "PROJECTEDCRS" => CrsKind::Projected,
            "LOCAL_CS" | "COMPD_CS" | "COMPOUNDCRS" | "ENGCRS" | "GEOCCS" => CrsKind::Unknown,
            _ => {
                return Err(GeoError::BadArgument(format!(
                    "unsupported WKT keyword '{keyword}'"
                )))
            }
        };
        let name = wkt[open + 1..]
            .trim_start()
            .strip_prefix('"')
            .and_then(|rest| rest.split_once('"'))
            .map(|(name, _)| name.to_string())
            .unwrap_or_default();

        Ok(SpatialRef {
            name,
            kind,
            authority: top_level_authority(wkt),
            wkt: wkt.to_string(),
        })
    }

    /// Build a reference from user input: `EPSG:n`, an OGC URN, `CRS84`,
    /// `WGS84`, or a WKT string.
    pub fn from_definition(definition: &str) -> Result<SpatialRef> {
        let def = definition.trim();
        let upper = def.to_ascii_uppercase();
        if let Some(code) = upper.strip_prefix("EPSG:") {
            return SpatialRef::from_epsg(parse_code(code, def)?);
        }
        if let Some(code) = upper.strip_prefix("URN:OGC:DEF:CRS:EPSG:") {
            // urn:ogc:def:crs:EPSG:[version]:code
            let code = code.rsplit(':').next().unwrap_or_default();
            return SpatialRef::from_epsg(parse_code(code, def)?);
        }
        match upper.as_str() {
            "WGS84" | "CRS84" | "OGC:CRS84" | "URN:OGC:DEF:CRS:OGC:1.3:CRS84" => {
                SpatialRef::from_epsg(4326)
            }
            _ if def.contains('[') => SpatialRef::from_wkt(def),
            _ => Err(GeoError::BadArgument(format!(
                "unrecognized spatial reference definition '{def}'"
            ))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> CrsKind {
        self.kind
    }

    pub fn is_geographic(&self) -> bool {
        self.kind == CrsKind::Geographic
    }

    pub fn is_projected(&self) -> bool {
        self.kind == CrsKind::Projected
    }

    pub fn to_wkt(&self) -> String {
        self.wkt.clone()
    }

    pub fn auth_name(&self) -> Option<&str> {
        self.authority.as_ref().map(|(name, _)| name.as_str())
    }

    pub fn auth_code(&self) -> Option<u32> {
        self.authority.as_ref().map(|(_, code)| *code)
    }

    /// The EPSG code, if this reference carries one.
    pub fn epsg_code(&self) -> Option<u32> {
        match &self.authority {
            Some((name, code)) if name.eq_ignore_ascii_case("EPSG") => Some(*code),
            _ => None,
        }
    }

    /// `AUTHORITY:CODE` when known, the WKT otherwise.
    pub fn to_user_string(&self) -> String {
        match &self.authority {
            Some((name, code)) => format!("{name}:{code}"),
            None => self.wkt.clone(),
        }
    }
}

fn parse_code(code: &str, def: &str) -> Result<u32> {
    code.trim().parse::<u32>().map_err(|_| {
        GeoError::BadArgument(format!("invalid EPSG code in '{def}'"))
    })
}

/// The authority of the outermost node: the last `AUTHORITY[...]` or `ID[...]`
/// at nesting depth one.
fn top_level_authority(wkt: &str) -> Option<(String, u32)> {
    let mut depth = 0usize;
    let mut found = None;
    let bytes = wkt.as_bytes();
    let mut in_string = false;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'"' => in_string = !in_string,
            b'[' | b'(' if !in_string => {
                if depth == 1 {
                    let head = wkt[..i].trim_end();
                    let start = head
                        .rfind(|c: char| c == ',' || c == '[' || c == '(')
                        .map_or(0, |p| p + 1);
                    let keyword = head[start..].trim().to_ascii_uppercase();
                    if keyword == "AUTHORITY" || keyword == "ID" {
                        found = parse_authority_body(&wkt[i + 1..]);
                    }
                }
                depth += 1;
            }
            b']' | b')' if !in_string => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    found
}

fn parse_authority_body(body: &str) -> Option<(String, u32)> {
    let end = body.find([']', ')'])?;
    let mut parts = body[..end].split(',');
    let name = parts.next()?.trim().trim_matches('"').to_string();
    let code = parts.next()?.trim().trim_matches('"').parse().ok()?;
    Some((name, code))
}

impl PartialEq for SpatialRef {
    fn eq(&self, other: &SpatialRef) -> bool {
        match (&self.authority, &other.authority) {
            (Some((a_name, a_code)), Some((b_name, b_code))) => {
                a_name.eq_ignore_ascii_case(b_name) && a_code == b_code
            }
            _ => self.wkt == other.wkt,
        }
    }
}

impl Display for SpatialRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_user_string())
    }
}
