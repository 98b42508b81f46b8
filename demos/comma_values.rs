//! Reading and writing comma separated lists, e.g. `s=12&r=1,2,3`.

use nested_qs::{ArrayFormat, ParseConfig, StringifyConfig};

fn main() {
    let query = "s=12&r=1,2,3";
    let map = ParseConfig::new().comma(true).parse(query).unwrap();
    println!("{:?}", map);

    let ids: Vec<u8> = map["r"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|v| v.as_str()?.parse().ok())
        .collect();
    assert_eq!(ids, [1, 2, 3]);

    let value = nested_qs::Value::Object(map);
    let config = StringifyConfig::new().array_format(ArrayFormat::Comma);
    let written = config.stringify(&value).unwrap();
    println!("{written}");
    assert_eq!(written, query);
}
