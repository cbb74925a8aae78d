use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

/// Upper bound on an uploaded scan.
const MAX_SCAN_BYTES: f64 = 32.0 * 1024.0 * 1024.0;

/// Offers `bytes` to the user as a file download named `filename`.
pub(super) fn download_report(filename: &str, mime: &str, bytes: &[u8]) -> Result<(), String> {
    let window = web_sys::window().ok_or("no window".to_string())?;
    let document = window.document().ok_or("no document".to_string())?;

    let array = js_sys::Uint8Array::from(bytes);
    let parts = js_sys::Array::new();
    parts.push(&array.buffer());
    let props = web_sys::BlobPropertyBag::new();
    props.set_type(mime);
    let blob = web_sys::Blob::new_with_u8_array_sequence_and_options(&parts, &props)
        .map_err(|_| "report: blob creation failed".to_string())?;

    let url = web_sys::Url::create_object_url_with_blob(&blob)
        .map_err(|_| "report: create_object_url failed".to_string())?;

    let a = document
        .create_element("a")
        .map_err(|_| "report: create_element failed".to_string())?
        .dyn_into::<web_sys::HtmlAnchorElement>()
        .map_err(|_| "report: anchor cast failed".to_string())?;

    a.set_href(&url);
    a.set_download(filename);
    a.click();

    let _ = web_sys::Url::revoke_object_url(&url);
    Ok(())
}

/// Reads an uploaded MRI scan. Only image files are accepted.
pub(super) async fn read_scan(file: web_sys::File) -> Result<Vec<u8>, String> {
    let kind = file.type_();
    if !kind.is_empty() && !kind.starts_with("image/") {
        return Err(format!("scan: expected an image, got {kind}"));
    }
    if file.size() > MAX_SCAN_BYTES {
        return Err(format!("scan: {} bytes exceeds the upload limit", file.size()));
    }

    let promise = array_buffer_promise(file)?;
    let v = wasm_bindgen_futures::JsFuture::from(promise)
        .await
        .map_err(|_| "scan: read failed".to_string())?;

    let buf = v
        .dyn_into::<js_sys::ArrayBuffer>()
        .map_err(|_| "scan: expected ArrayBuffer".to_string())?;
    Ok(js_sys::Uint8Array::new(&buf).to_vec())
}

fn array_buffer_promise(file: web_sys::File) -> Result<js_sys::Promise, String> {
    let reader =
        web_sys::FileReader::new().map_err(|_| "scan: FileReader::new failed".to_string())?;
    reader
        .read_as_array_buffer(&file)
        .map_err(|_| "scan: read_as_array_buffer failed".to_string())?;

    Ok(js_sys::Promise::new(&mut |resolve, reject| {
        let reject_err = reject.clone();
        let reader_ok = reader.clone();
        let onload = Closure::wrap(Box::new(move |_ev: web_sys::ProgressEvent| {
            match reader_ok.result() {
                Ok(v) if !v.is_null() && !v.is_undefined() => {
                    let _ = resolve.call1(&JsValue::UNDEFINED, &v);
                }
                _ => {
                    let _ = reject.call1(&JsValue::UNDEFINED, &JsValue::from_str("scan: no data"));
                }
            }
        }) as Box<dyn FnMut(_)>);
        reader.set_onload(Some(onload.as_ref().unchecked_ref()));
        onload.forget();

        let onerror = Closure::wrap(Box::new(move |_ev: web_sys::ProgressEvent| {
            let _ = reject_err.call1(&JsValue::UNDEFINED, &JsValue::from_str("scan: read error"));
        }) as Box<dyn FnMut(_)>);
        reader.set_onerror(Some(onerror.as_ref().unchecked_ref()));
        onerror.forget();
    }))
}
