//! End-to-end compilation of a small document into an HTML file.

use scribe::testing::Harness;

#[test]
fn compiles_a_small_document() {
    let mut harness = Harness::new(scribe_stdlib::built_ins());
    harness.add_file("/intro.psc", "Hello «world»!\n\nSecond paragraph...");
    harness
        .run_and_render(
            "$branch.create.root[html][book][book.html]\
             $branch.write[book][\
             $tag.open[h1][block]Title$tag.close[h1]\
             $include[intro]]",
        )
        .unwrap();
    assert_eq!(
        harness.output_file("/output/book.html").as_deref(),
        Some(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
             <!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.1//EN\"\n\
             \"http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd\">\n\
             <html>\n\
             <head>\n\
             <meta http-equiv=\"Content-Type\" \
             content=\"application/xhtml+xml; charset=utf-8\"/>\n\
             </head>\n\
             <body>\n\
             <h1>Title</h1>\n\
             <p>Hello «world»!</p>\n\
             <p>Second paragraph…</p>\n\
             </body>\n\
             </html>\n"
        )
    );
}

#[test]
fn numbered_sections_via_counters_and_user_macros() {
    let mut harness = Harness::new(scribe_stdlib::built_ins());
    harness
        .run(
            "$counter.create[chapter]\
             $macro.new[section(title)][$chapter.incr<$chapter> $title.]\
             $section[One]$section[Two]",
        )
        .unwrap();
    assert_eq!(harness.system_output(), "<1> One.<2> Two.");
}

#[test]
fn french_typography_inserts_non_breaking_spaces() {
    let mut harness = Harness::new(scribe_stdlib::built_ins());
    harness
        .run(
            "$branch.create.root[html][page][]\
             $branch.write[page][$typo.set[french]Non !]",
        )
        .unwrap();
    assert!(harness
        .branch_output("page")
        .contains("<p>Non\u{a0}!</p>"));
}
