use super::*;
use crate::Error;

#[test]
fn test_parse_iso8601() {
    let testcases = vec![
        ("PT6H", Duration::hours(6)),
        ("P7D", Duration::days(7)),
        ("p7d", Duration::days(7)),
        ("P1W", Duration::weeks(1)),
        ("PT90M", Duration::minutes(90)),
        ("PT1.5S", Duration::milliseconds(1500)),
        ("PT0,25S", Duration::milliseconds(250)),
        ("PT.5S", Duration::milliseconds(500)),
        ("PT1.23456S", Duration::milliseconds(1234)),
        (
            "P1DT2H3M4S",
            Duration::days(1) + Duration::hours(2) + Duration::minutes(3) + Duration::seconds(4),
        ),
        ("-PT1M", Duration::minutes(-1)),
        ("PT0S", Duration::zero()),
    ];

    for (text, ref_duration) in testcases.into_iter() {
        assert_eq!(parse_duration(text).unwrap(), ref_duration, "{}", text);
    }
}

#[test]
fn test_parse_humantime() {
    assert_eq!(parse_duration("6h").unwrap(), Duration::hours(6));
    assert_eq!(parse_duration("7days").unwrap(), Duration::days(7));
    assert_eq!(parse_duration(" 1h 30m ").unwrap(), Duration::minutes(90));
}

#[test]
fn test_parse_duration_fail() {
    let testcases = vec![
        "", "P", "PT", "P1Y", "P2M", "P1.5D", "PT1S2M", "PT5", "P5H", "PTXS", "-6h",
        "PT1.2.3S", "P1DT", "forever",
    ];
    for text in testcases.into_iter() {
        match parse_duration(text) {
            Err(Error::InvalidConfig(_, _)) => (),
            res => panic!("{:?} {:?}", text, res),
        }
    }
}
