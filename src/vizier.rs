//! VizieR catalog access: query URLs, the `asu-txt` fixed-width table
//! format, and conversion of downloaded tables into binary segments.

use std::fs;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::catalog::{CatalogStore, SegmentWriter, StarRecord};
use crate::equatorial::Equatorial;
use crate::{MaskError, Result};

/// Gaia DR2 as served by VizieR.
pub const GAIA_DR2: &str = "I/345/gaia2";

/// Known VizieR mirrors, primary site first.
pub const MIRRORS: &[&str] = &[
    "https://vizier.cds.unistra.fr/",
    "https://vizier.cfa.harvard.edu/",
    "https://vizier.nao.ac.jp/",
    "https://vizier.iucaa.in/",
    "https://vizier.china-vo.org/",
];

const COLUMNS: &str = "ra,dec,Gmag,pmRA,pmDE";

/// Blocking HTTP client bound to one mirror and one catalog source.
pub struct VizierClient {
    http: reqwest::blocking::Client,
    site: String,
    source: String,
}

impl VizierClient {
    pub fn new(site: &str, source: &str) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| MaskError::Download(e.to_string()))?;
        let mut site = site.to_string();
        if !site.ends_with('/') {
            site.push('/');
        }
        Ok(Self {
            http,
            site,
            source: source.to_string(),
        })
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    /// `asu-txt` box query URL. `box_deg` is (RA arc, Dec extent) in
    /// degrees; `mag_range` restricts Gmag when present.
    pub fn box_query_url(
        &self,
        center: &Equatorial,
        box_deg: [f64; 2],
        mag_range: Option<(f32, f32)>,
    ) -> String {
        let mut url = format!(
            "{}viz-bin/asu-txt/?-source={}&-c.ra={:.6}&-c.dec={:.6}&-c.bd={:.6}x{:.6}&-out.max=unlimited&-out={}",
            self.site, self.source, center.ra_deg, center.dec_deg, box_deg[0], box_deg[1], COLUMNS
        );
        if let Some((lo, hi)) = mag_range {
            url.push_str(&format!("&Gmag={lo}..{hi}"));
        }
        url
    }

    /// Fetch one box query as raw `asu-txt`.
    pub fn fetch_box(
        &self,
        center: &Equatorial,
        box_deg: [f64; 2],
        mag_range: Option<(f32, f32)>,
    ) -> Result<String> {
        let url = self.box_query_url(center, box_deg, mag_range);
        debug!(%url, "querying VizieR");
        let response = self
            .http
            .get(&url)
            .send()
            .map_err(|e| MaskError::Download(format!("{}: {e}", self.site)))?;
        if !response.status().is_success() {
            return Err(MaskError::Download(format!(
                "{} returned {}",
                self.site,
                response.status()
            )));
        }
        response
            .text()
            .map_err(|e| MaskError::Download(e.to_string()))
    }
}

/// Parse an `asu-txt` response into star records.
///
/// Column names and order come from the `#-out=` line of the
/// `#INFO queryParameters=N` block, not from the table header. The header
/// itself is a sandwich: a dash ruler, wrapped header text, an identical
/// second ruler, then fixed-width data rows terminated by a blank line.
/// Field boundaries come from the ruler. An empty result set has no ruler
/// at all and parses to no records.
pub fn parse_table(text: &str) -> Result<Vec<StarRecord>> {
    let lines: Vec<&str> = text.lines().collect();

    let names = out_columns(&lines);

    let Some(first_ruler) = lines.iter().position(|l| is_ruler(l)) else {
        return Ok(Vec::new());
    };
    let ruler = lines[first_ruler];
    let second_ruler = lines[first_ruler + 1..]
        .iter()
        .position(|l| *l == ruler)
        .map(|i| first_ruler + 1 + i)
        .ok_or_else(|| MaskError::Table("header ruler is not repeated".into()))?;

    if names.is_empty() {
        return Err(MaskError::Table("no #-out column list".into()));
    }
    let spans = ruler_spans(ruler);

    let col = |name: &str| -> Result<usize> {
        let index = names
            .iter()
            .position(|n| *n == name)
            .ok_or_else(|| MaskError::Table(format!("missing column {name}")))?;
        if index >= spans.len() {
            return Err(MaskError::Table(format!(
                "column {name} has no ruler field"
            )));
        }
        Ok(index)
    };
    let ra_col = col("ra")?;
    let dec_col = col("dec")?;
    let mag_col = col("Gmag")?;
    let pm_ra_col = col("pmRA")?;
    let pm_dec_col = col("pmDE")?;

    let mut stars = Vec::new();
    for line in &lines[second_ruler + 1..] {
        if line.trim().is_empty() || line.starts_with('#') {
            break;
        }
        let field = |c: usize| {
            let (a, b) = spans[c];
            slice_field(line, a, b)
        };
        // Rows without a magnitude cannot be painted and are dropped;
        // missing proper motion just means zero.
        let Ok(ra_deg) = field(ra_col).parse::<f64>() else {
            continue;
        };
        let Ok(dec_deg) = field(dec_col).parse::<f64>() else {
            continue;
        };
        let Ok(g_mag) = field(mag_col).parse::<f32>() else {
            continue;
        };
        stars.push(StarRecord {
            ra_deg,
            dec_deg,
            g_mag,
            pm_ra: field(pm_ra_col).parse().unwrap_or(0.0),
            pm_dec: field(pm_dec_col).parse().unwrap_or(0.0),
        });
    }
    Ok(stars)
}

/// Column names from the query-parameter block: `queryParameters=N` is
/// followed by N `#-key=value` lines, of which `#-out` lists the output
/// columns in table order.
fn out_columns<'a>(lines: &[&'a str]) -> Vec<&'a str> {
    let Some(start) = lines.iter().position(|l| l.contains("queryParameters=")) else {
        return Vec::new();
    };
    let count = lines[start]
        .rsplit('=')
        .next()
        .and_then(|n| n.trim().parse::<usize>().ok())
        .unwrap_or(0);
    for line in lines.iter().skip(start + 1).take(count) {
        if let Some((key, value)) = line.split_once('=') {
            if key == "#-out" {
                return value.split(',').map(str::trim).collect();
            }
        }
    }
    Vec::new()
}

fn is_ruler(line: &str) -> bool {
    !line.is_empty() && line.contains('-') && line.chars().all(|c| c == '-' || c == ' ')
}

/// Byte ranges of each dash run in the ruler line.
fn ruler_spans(ruler: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;
    for (i, c) in ruler.char_indices() {
        match (c, start) {
            ('-', None) => start = Some(i),
            (' ', Some(s)) => {
                spans.push((s, i));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        spans.push((s, ruler.len()));
    }
    spans
}

fn slice_field(line: &str, start: usize, end: usize) -> &str {
    let end = end.min(line.len());
    if start >= end {
        return "";
    }
    line[start..end].trim()
}

/// Convert a table into a binary segment at the descriptor's path, via a
/// temp file so a failed conversion never leaves a truncated segment. The
/// store's manifest is updated and saved on success.
pub fn convert_to_segment(store: &mut CatalogStore, index: usize, text: &str) -> Result<()> {
    let stars = parse_table(text)?;
    let path = store.segment_path(&store.manifest.segments[index]);
    let tmp = path.with_extension("part");

    let mut writer = SegmentWriter::create(&tmp)?;
    let mut min_mag = f32::MAX;
    let mut max_mag = f32::MIN;
    for star in &stars {
        min_mag = min_mag.min(star.g_mag);
        max_mag = max_mag.max(star.g_mag);
        writer.write_record(star)?;
    }
    let records = writer.finish()?;
    if records == 0 {
        min_mag = 0.0;
        max_mag = 0.0;
    }
    fs::rename(&tmp, &path)?;
    store.commit_segment(index, min_mag, max_mag, records)
}

/// Download every invalid non-supplement segment of the store, trying the
/// preferred mirror first and falling back through the rest.
pub fn download_missing(
    store: &mut CatalogStore,
    preferred_site: &str,
    mag_range: Option<(f32, f32)>,
) -> Result<()> {
    let mut sites: Vec<&str> = vec![preferred_site];
    sites.extend(MIRRORS.iter().filter(|s| **s != preferred_site));

    let pending: Vec<usize> = store
        .manifest
        .segments
        .iter()
        .enumerate()
        .filter(|(_, s)| !s.valid && s.source != "BSC")
        .map(|(i, _)| i)
        .collect();
    if pending.is_empty() {
        return Ok(());
    }
    info!(segments = pending.len(), "downloading catalog segments");

    for index in pending {
        let (center, box_deg, source) = {
            let seg = &store.manifest.segments[index];
            (seg.center, seg.box_deg, seg.source.clone())
        };
        let mut last_err = None;
        let mut done = false;
        for &site in &sites {
            let client = VizierClient::new(site, &source)?;
            match client.fetch_box(&center, box_deg, mag_range) {
                Ok(text) => {
                    convert_to_segment(store, index, &text)?;
                    info!(
                        segment = index,
                        records = store.manifest.segments[index].records,
                        site = client.site(),
                        "segment downloaded"
                    );
                    done = true;
                    break;
                }
                Err(e) => {
                    warn!(segment = index, site, error = %e, "mirror failed");
                    last_err = Some(e);
                }
            }
        }
        if !done {
            return Err(last_err
                .unwrap_or_else(|| MaskError::Download("no mirrors configured".into())));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SAMPLE: &str = r#"#
#   VizieR Astronomical Server vizier.cds.unistra.fr
#INFO queryParameters=7
#-oc.form=dec
#-source=I/345/gaia2
#-c.ra=229.969808
#-c.dec=2.330356
#-c.bd=1.000000x1.000000
#-out.max=unlimited
#-out=ra,dec,Gmag,pmRA,pmDE

#RESOURCE=yCat_1345
#Table I_345_gaia2:

--------------- --------------- ------- --------- ---------
                                Gma     pmRA      pmDE
RA_ICRS (deg)   DE_ICRS (deg)   g (mag) (mas/yr)  (mas/yr)
--------------- --------------- ------- --------- ---------
229.96980800000 +02.33035600000 11.1234   -21.072    -2.828
230.01234500000 +02.40000000000  9.5000
229.90000000000 +02.31000000000           1.000     2.000

#END
"#;

    #[test]
    fn parses_double_ruler_table() {
        let stars = parse_table(SAMPLE).unwrap();
        // The magnitude-less third row is dropped.
        assert_eq!(stars.len(), 2);
        assert_relative_eq!(stars[0].ra_deg, 229.969808, epsilon = 1e-9);
        assert_relative_eq!(stars[0].dec_deg, 2.330356, epsilon = 1e-9);
        assert_relative_eq!(stars[0].g_mag, 11.1234);
        assert_relative_eq!(stars[0].pm_ra, -21.072);
        assert_relative_eq!(stars[0].pm_dec, -2.828);
    }

    #[test]
    fn wrapped_header_between_rulers_is_skipped() {
        // The sandwich lines carry split column labels ("Gma"/"g (mag)")
        // that must never be read as names or data.
        let stars = parse_table(SAMPLE).unwrap();
        assert!(stars.iter().all(|s| s.ra_deg > 229.0 && s.ra_deg < 231.0));
    }

    #[test]
    fn blank_proper_motion_reads_as_zero() {
        let stars = parse_table(SAMPLE).unwrap();
        assert_relative_eq!(stars[1].pm_ra, 0.0);
        assert_relative_eq!(stars[1].pm_dec, 0.0);
    }

    #[test]
    fn empty_response_yields_no_stars() {
        let text = "#\n#INFO queryParameters=7\n#-source=I/345/gaia2\n\n#END\n";
        assert!(parse_table(text).unwrap().is_empty());
    }

    #[test]
    fn ruler_spans_split_on_gaps() {
        let spans = ruler_spans("--- ----- --");
        assert_eq!(spans, vec![(0, 3), (4, 9), (10, 12)]);
    }

    #[test]
    fn unrepeated_ruler_is_an_error() {
        let text = r#"#INFO queryParameters=2
#-source=I/345/gaia2
#-out=ra,dec,Gmag,pmRA,pmDE
--------- --------
  1.00000  2.00000
"#;
        assert!(matches!(parse_table(text), Err(MaskError::Table(_))));
    }

    #[test]
    fn missing_column_is_an_error() {
        let text = r#"#INFO queryParameters=2
#-source=I/345/gaia2
#-out=ra,dec
--------- --------
ra (deg)  de (deg)
--------- --------
  1.00000  2.00000
"#;
        assert!(matches!(parse_table(text), Err(MaskError::Table(_))));
    }

    #[test]
    fn box_url_includes_geometry_and_filter() {
        let client = VizierClient::new("https://vizier.cds.unistra.fr", GAIA_DR2).unwrap();
        let center = Equatorial::from_degrees(229.969808, 2.330356);
        let url = client.box_query_url(&center, [1.0, 0.5], Some((-2.0, 12.0)));
        assert!(url.starts_with("https://vizier.cds.unistra.fr/viz-bin/asu-txt/?"));
        assert!(url.contains("-source=I/345/gaia2"));
        assert!(url.contains("-c.ra=229.969808"));
        assert!(url.contains("-c.dec=2.330356"));
        assert!(url.contains("-c.bd=1.000000x0.500000"));
        assert!(url.contains("&-out=ra,dec,Gmag,pmRA,pmDE"));
        assert!(url.contains("&Gmag=-2..12"));
    }

    #[test]
    fn unfiltered_url_has_no_mag_constraint() {
        let client = VizierClient::new("https://vizier.cds.unistra.fr/", GAIA_DR2).unwrap();
        let center = Equatorial::from_degrees(0.0, 0.0);
        let url = client.box_query_url(&center, [1.0, 1.0], None);
        assert!(!url.contains("Gmag="));
    }
}
