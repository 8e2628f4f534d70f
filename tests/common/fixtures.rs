//! Catalog fixtures and mock dataset host setup

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Catalog header in the column order of the published dataset
pub const HEADER: &str = "patientid,offset,sex,age,finding,survival,intubated,went_icu,needed_supplemental_O2,extubated,temperature,pO2_saturation,leukocyte_count,neutrophil_count,lymphocyte_count,view,modality,date,location,folder,filename,doi,url,license,clinical_notes,other_notes";

/// Path prefix the mock host serves the dataset under
pub const DATASET_PREFIX: &str = "/dataset";

/// A complete 26-field catalog row
pub fn image_row(patient_id: &str, finding: &str, folder: &str, filename: &str) -> String {
    format!(
        "{patient_id},0,M,65,{finding},Y,N,N,Y,N,38.1,91,7.4,5.9,0.8,AP,X-ray,\"March 3, 2020\",\"Milan, Italy\",{folder},{filename},10.1000/xyz,https://example.org/case,CC BY 4.0,\"fever, cough\","
    )
}

/// Header followed by `rows`
pub fn catalog(rows: &[String]) -> String {
    let mut csv = String::from(HEADER);
    for row in rows {
        csv.push('\n');
        csv.push_str(row);
    }
    csv.push('\n');
    csv
}

/// Bytes served for an image path
pub fn image_bytes(remote_path: &str) -> Vec<u8> {
    format!("PNG:{remote_path}").into_bytes()
}

/// Serve `csv` as the catalog
pub async fn mount_catalog(server: &MockServer, csv: &str) {
    Mock::given(method("GET"))
        .and(path(format!("{DATASET_PREFIX}/metadata.csv")))
        .respond_with(ResponseTemplate::new(200).set_body_string(csv))
        .mount(server)
        .await;
}

/// Serve the image at `remote_path`, expecting exactly `times` requests
pub async fn mount_image(server: &MockServer, remote_path: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path(format!("{DATASET_PREFIX}/{remote_path}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(image_bytes(remote_path)))
        .expect(times)
        .mount(server)
        .await;
}

/// Answer `remote_path` with `status`
pub async fn mount_status(server: &MockServer, remote_path: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(format!("{DATASET_PREFIX}/{remote_path}")))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}
