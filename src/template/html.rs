use scraper::ElementRef;
use scraper::Html;
use scraper::Selector;

fn element_text(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_owned()
}

/// Header labels of an HTML template.
///
/// Every `<th>` of the document in order; without any, the `<td>` cells of the first
/// row of the first table.
pub fn html_labels(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let th = Selector::parse("th").expect("Hardcode selector");
    let table = Selector::parse("table").expect("Hardcode selector");
    let tr = Selector::parse("tr").expect("Hardcode selector");
    let td = Selector::parse("td").expect("Hardcode selector");

    let headers: Vec<String> = document.select(&th).map(element_text).collect();
    if !headers.is_empty() {
        return headers;
    }
    let Some(first_row) = document.select(&table).next().and_then(|table| table.select(&tr).next()) else {
        log::debug!("HTML template has no table header");
        return Vec::new();
    };
    first_row.select(&td).map(element_text).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_from_th() {
        let html = "<table><tr><th> Employee ID </th><th>E-mail &amp; Phone</th></tr><tr><td>x</td></tr></table>";
        assert_eq!(html_labels(html), vec!["Employee ID", "E-mail & Phone"]);
    }

    #[test]
    fn test_labels_from_first_row() {
        let html = "<p>Staff</p><table><tr><td>Name</td><td><b>Dept</b></td></tr><tr><td>Ann</td></tr></table>\
                    <table><tr><td>Other</td></tr></table>";
        assert_eq!(html_labels(html), vec!["Name", "Dept"]);
    }

    #[test]
    fn test_no_table() {
        assert!(html_labels("<p>Nothing here</p>").is_empty());
        assert!(html_labels("").is_empty());
    }
}
