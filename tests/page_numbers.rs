use folio_pdf::{format_page_number, from_chinese, from_roman, to_chinese, to_roman};

#[test]
fn numerals_round_trip_for_every_page_up_to_500() {
    for n in 1..=500u32 {
        assert_eq!(from_roman(&to_roman(n)), Some(n), "roman {n}");
        assert_eq!(from_roman(&to_roman(n).to_lowercase()), Some(n), "roman_lower {n}");
        assert_eq!(from_chinese(&to_chinese(n)), Some(n), "chinese {n}");
        let arabic = format_page_number(n as usize, 500, "{page}");
        assert_eq!(arabic.parse::<u32>().ok(), Some(n));
    }
}

#[test]
fn formatter_is_pure() {
    let fmt = "第{page:chinese}页 / 共{total:chinese}页 ({page:roman})";
    let once = format_page_number(12, 305, fmt);
    assert_eq!(once, "第十二页 / 共三百零五页 (XII)");
    assert_eq!(format_page_number(12, 305, fmt), once);
}

#[test]
fn literal_text_and_unknown_styles_pass_through() {
    assert_eq!(format_page_number(7, 9, "Page"), "Page");
    assert_eq!(format_page_number(7, 9, "{page:klingon}/{total}"), "{page:klingon}/9");
}
