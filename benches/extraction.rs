use anime_source_resolver::catalog::episodes::parse_episodes;
use anime_source_resolver::catalog::language::detect_languages;
use anime_source_resolver::catalog::search::parse_search_page;
use anime_source_resolver::catalog::servers::parse_servers;
use anime_source_resolver::catalog::sources::scan_page;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn episode_page(count: usize) -> String {
    let items: String = (1..=count)
        .map(|n| {
            format!(
                r#"<li class="ep-item"><span class="num">{n}</span><a href="/episode/naruto-1x{n}"><span class="title">Episode {n} Hindi</span></a></li>"#
            )
        })
        .collect();
    format!("<html><body><ul class=\"list\">{}</ul></body></html>", items)
}

fn search_page(count: usize) -> String {
    let cards: String = (1..=count)
        .map(|n| {
            format!(
                r#"<div class="item"><a href="/series/title-{n}/"><img src="/{n}.jpg"></a><h3>Title {n}</h3><span class="year">{year}</span></div>"#,
                year = 2000 + n % 25
            )
        })
        .collect();
    format!("<html><body>{}</body></html>", cards)
}

fn bench_language_detection(c: &mut Criterion) {
    c.bench_function("detect_languages_short", |b| {
        b.iter(|| black_box(detect_languages(black_box("Naruto Shippuden (Hindi + Tamil Dub)"))))
    });

    let long_text = "A long synopsis without any language marker. ".repeat(200);
    c.bench_function("detect_languages_long_miss", |b| {
        b.iter(|| black_box(detect_languages(black_box(&long_text))))
    });
}

fn bench_episode_extraction(c: &mut Criterion) {
    let small = episode_page(12);
    c.bench_function("episodes_12", |b| {
        b.iter(|| black_box(parse_episodes(black_box(&small), "naruto", "https://anime-world.co/series/naruto")))
    });

    let large = episode_page(500);
    c.bench_function("episodes_500", |b| {
        b.iter(|| black_box(parse_episodes(black_box(&large), "naruto", "https://anime-world.co/series/naruto")))
    });
}

fn bench_search_and_servers(c: &mut Criterion) {
    let search = search_page(40);
    c.bench_function("search_page_40", |b| b.iter(|| black_box(parse_search_page(black_box(&search), 1))));

    let servers = r#"<html><body>
        <div class="server-item" data-id="1">Hindi</div>
        <div class="server-item" data-id="2">Tamil</div>
        <div class="server-item" data-id="3" data-src="https://cdn.example/a.m3u8">Telugu</div>
    </body></html>"#;
    c.bench_function("servers_3", |b| {
        b.iter(|| {
            black_box(parse_servers(
                black_box(servers),
                "https://anime-world.co",
                "naruto-1x1",
                "https://anime-world.co/episode/naruto-1x1",
            ))
        })
    });

    let player = format!(
        "<html><body>{}<script>var src = \"https://cdn.example/hls/master.m3u8\";</script></body></html>",
        "<p>filler</p>".repeat(500)
    );
    c.bench_function("scan_page_m3u8", |b| b.iter(|| black_box(scan_page(black_box(&player)))));
}

criterion_group!(
    benches,
    bench_language_detection,
    bench_episode_extraction,
    bench_search_and_servers
);
criterion_main!(benches);
