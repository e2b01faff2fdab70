//! Parsers turning feature-service payloads into normalized features.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;
use serde_json::{Map, Value};

use firewatch_core::{Feature, Position};

use super::WireFormat;
use crate::error::FetchError;

const LATITUDE_KEYS: [&str; 6] = ["latitude", "lat", "y", "latitud", "lat_dd", "latitude_dd"];
const LONGITUDE_KEYS: [&str; 8] = ["longitude", "lon", "lng", "long", "x", "longitud", "lon_dd", "longitude_dd"];

pub fn parse(format: WireFormat, body: &str) -> Result<Vec<Feature>, FetchError> {
    match format {
        WireFormat::GeoJson => parse_geojson(body),
        WireFormat::Csv => parse_csv(body),
        WireFormat::Kml => parse_kml(body),
    }
}

/// A JSON object with a `features` array. Entries that are not features
/// are skipped.
pub fn parse_geojson(body: &str) -> Result<Vec<Feature>, FetchError> {
    let value: Value = serde_json::from_str(body).map_err(|e| FetchError::Parse(e.to_string()))?;
    let features = value
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| FetchError::InvalidPayload("GeoJSON payload has no features array".to_string()))?;

    Ok(features
        .iter()
        .filter_map(|feature| serde_json::from_value::<Feature>(feature.clone()).ok())
        .collect())
}

/// Trimmed cell as a JSON value: numbers stay numeric, blanks are dropped.
fn normalize_cell(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(int) = trimmed.parse::<i64>() {
        return Some(Value::from(int));
    }
    if let Some(number) = trimmed
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .and_then(serde_json::Number::from_f64)
    {
        return Some(Value::Number(number));
    }
    Some(Value::String(trimmed.to_string()))
}

fn find_column(headers: &[String], keys: &[&str]) -> Option<usize> {
    keys.iter()
        .find_map(|key| headers.iter().position(|h| h.eq_ignore_ascii_case(key)))
}

/// Delimited text with a header row naming latitude/longitude columns.
pub fn parse_csv(body: &str) -> Result<Vec<Feature>, FetchError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| FetchError::Parse(e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();

    let (Some(lat_col), Some(lon_col)) = (
        find_column(&headers, &LATITUDE_KEYS),
        find_column(&headers, &LONGITUDE_KEYS),
    ) else {
        return Err(FetchError::InvalidPayload(
            "CSV header has no latitude/longitude columns".to_string(),
        ));
    };

    let mut features = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let Ok(record) = record else {
            continue;
        };
        let coordinate = |col: usize| {
            record
                .get(col)
                .and_then(|cell| cell.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite())
        };
        let (Some(lat), Some(lon)) = (coordinate(lat_col), coordinate(lon_col)) else {
            continue;
        };

        let mut properties = Map::new();
        for (col, cell) in record.iter().enumerate() {
            if col == lat_col || col == lon_col {
                continue;
            }
            let Some(header) = headers.get(col) else {
                continue;
            };
            if let Some(value) = normalize_cell(cell) {
                properties.insert(header.clone(), value);
            }
        }

        let id = properties
            .get("id")
            .cloned()
            .unwrap_or_else(|| Value::String(format!("csv-{index}")));
        features.push(Feature::point(Position::new(lon, lat), properties).with_id(id));
    }
    Ok(features)
}

#[derive(Debug, Default, Deserialize)]
struct KmlContainer {
    #[serde(rename = "Document", default)]
    documents: Vec<KmlContainer>,
    #[serde(rename = "Folder", default)]
    folders: Vec<KmlContainer>,
    #[serde(rename = "Placemark", default)]
    placemarks: Vec<Placemark>,
}

#[derive(Debug, Deserialize)]
struct Placemark {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "Point", default)]
    point: Option<KmlPoint>,
    #[serde(rename = "ExtendedData", default)]
    extended_data: Option<ExtendedData>,
}

#[derive(Debug, Deserialize)]
struct KmlPoint {
    #[serde(default)]
    coordinates: String,
}

#[derive(Debug, Default, Deserialize)]
struct ExtendedData {
    #[serde(rename = "Data", default)]
    data: Vec<KmlData>,
    #[serde(rename = "SchemaData", default)]
    schema_data: Vec<SchemaData>,
}

#[derive(Debug, Deserialize)]
struct KmlData {
    #[serde(rename = "@name")]
    name: String,
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SchemaData {
    #[serde(rename = "SimpleData", default)]
    simple_data: Vec<SimpleData>,
}

#[derive(Debug, Deserialize)]
struct SimpleData {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "$text", default)]
    value: String,
}

impl KmlContainer {
    fn collect_placemarks(self, out: &mut Vec<Placemark>) {
        out.extend(self.placemarks);
        for child in self.documents.into_iter().chain(self.folders) {
            child.collect_placemarks(out);
        }
    }
}

impl Placemark {
    fn position(&self) -> Option<Position> {
        let first = self.point.as_ref()?.coordinates.split_whitespace().next()?;
        let mut parts = first.split(',').map(|p| p.trim().parse::<f64>().ok());
        let lon = parts.next()??;
        let lat = parts.next()??;
        let position = Position::new(lon, lat);
        position.is_finite().then_some(position)
    }

    fn properties(self) -> Map<String, Value> {
        let mut properties = Map::new();
        if let Some(name) = self.name {
            properties.insert("name".into(), Value::String(name.trim().to_string()));
        }
        if let Some(description) = self.description {
            properties.insert("description".into(), Value::String(description.trim().to_string()));
        }
        let extended = self.extended_data.unwrap_or_default();
        for data in extended.data {
            let value = data.value.map(|v| Value::String(v.trim().to_string())).unwrap_or(Value::Null);
            properties.insert(data.name, value);
        }
        for simple in extended.schema_data.into_iter().flat_map(|s| s.simple_data) {
            properties.insert(simple.name, Value::String(simple.value.trim().to_string()));
        }
        properties
    }
}

fn root_element(body: &str) -> Option<String> {
    let mut reader = Reader::from_str(body);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Some(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

/// KML document; only Placemarks with a Point geometry are kept.
pub fn parse_kml(body: &str) -> Result<Vec<Feature>, FetchError> {
    if root_element(body).as_deref() != Some("kml") {
        return Err(FetchError::InvalidPayload("document root is not <kml>".to_string()));
    }
    let root: KmlContainer = quick_xml::de::from_str(body).map_err(|e| FetchError::Parse(e.to_string()))?;

    let mut placemarks = Vec::new();
    root.collect_placemarks(&mut placemarks);

    Ok(placemarks
        .into_iter()
        .filter_map(|placemark| Some((placemark.position()?, placemark)))
        .enumerate()
        .map(|(index, (position, placemark))| {
            let properties = placemark.properties();
            let id = properties
                .get("id")
                .cloned()
                .unwrap_or_else(|| Value::String(format!("kml-{index}")));
            Feature::point(position, properties).with_id(id)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn geojson_requires_features_array() {
        assert!(matches!(parse_geojson(r#"{"type":"FeatureCollection"}"#), Err(FetchError::InvalidPayload(_))));
        assert!(matches!(parse_geojson("<html>"), Err(FetchError::Parse(_))));

        let body = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","geometry":{"type":"Point","coordinates":[-50.1,-10.2]},"properties":{"frp":3.5}},
            {"type":"Feature","geometry":null,"properties":null}
        ]}"#;
        let features = parse_geojson(body).unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].point_position(), Some(Position::new(-50.1, -10.2)));
        assert!(!features[1].has_geometry());
    }

    #[test]
    fn csv_rows_become_point_features() {
        let body = "LATITUDE,Longitude,frp,satellite,confidence\n\
                    -10.5, -50.25, 12.5 ,N20,\n\
                    bad,-50,1,N20,n\n\
                    -11,-51,7,N21,h\n";
        let features = parse_csv(body).unwrap();
        assert_eq!(features.len(), 2);

        let first = &features[0];
        assert_eq!(first.point_position(), Some(Position::new(-50.25, -10.5)));
        assert_eq!(first.id, Some(json!("csv-0")));
        assert_eq!(first.properties["frp"], json!(12.5));
        assert_eq!(first.properties["satellite"], json!("N20"));
        assert!(!first.properties.contains_key("confidence"));
        assert!(!first.properties.contains_key("LATITUDE"));

        // Row indices count skipped rows too.
        assert_eq!(features[1].id, Some(json!("csv-2")));
        assert_eq!(features[1].properties["frp"], json!(7));
    }

    #[test]
    fn csv_without_coordinate_columns_is_invalid() {
        assert!(matches!(parse_csv("a,b\n1,2\n"), Err(FetchError::InvalidPayload(_))));
    }

    #[test]
    fn csv_id_column_is_kept() {
        let features = parse_csv("id,lat,lon\nabc,1,2\n").unwrap();
        assert_eq!(features[0].id, Some(json!("abc")));
    }

    #[test]
    fn kml_keeps_point_placemarks_only() {
        let body = r##"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <name>fires</name>
    <Placemark>
      <name>line</name>
      <LineString><coordinates>0,0 1,1</coordinates></LineString>
    </Placemark>
    <Folder>
      <Placemark>
        <name>hotspot</name>
        <description><![CDATA[<b>VIIRS</b>]]></description>
        <ExtendedData>
          <Data name="frp"><value>21.4</value></Data>
          <SchemaData schemaUrl="#fires"><SimpleData name="satellite">N</SimpleData></SchemaData>
        </ExtendedData>
        <Point><coordinates>-47.9,-15.8,0</coordinates></Point>
      </Placemark>
    </Folder>
  </Document>
</kml>"##;
        let features = parse_kml(body).unwrap();
        assert_eq!(features.len(), 1);
        let feature = &features[0];
        assert_eq!(feature.point_position(), Some(Position::new(-47.9, -15.8)));
        assert_eq!(feature.id, Some(json!("kml-0")));
        assert_eq!(feature.properties["name"], json!("hotspot"));
        assert_eq!(feature.properties["description"], json!("<b>VIIRS</b>"));
        assert_eq!(feature.properties["frp"], json!("21.4"));
        assert_eq!(feature.properties["satellite"], json!("N"));
    }

    #[test]
    fn non_kml_documents_are_invalid() {
        assert!(matches!(
            parse_kml("<html><body>error</body></html>"),
            Err(FetchError::InvalidPayload(_))
        ));
        assert!(matches!(parse_kml(""), Err(FetchError::InvalidPayload(_))));
    }
}
