use leptos::prelude::*;

use crate::app::{Cities, Selected, SelectionHandle};

/// Keep the focused entry visible when the selection moves by keyboard.
fn reveal_entry(index: usize) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let Some(document) = window.document() else {
        return;
    };
    let selector = format!("[data-city-idx=\"{index}\"]");
    if let Ok(Some(el)) = document.query_selector(&selector) {
        let options = web_sys::ScrollIntoViewOptions::new();
        options.set_block(web_sys::ScrollLogicalPosition::Nearest);
        el.scroll_into_view_with_scroll_into_view_options(&options);
    }
}

/// City list with per-city counts and a running total.
#[component]
pub fn Sidebar(title: String) -> impl IntoView {
    let selection: SelectionHandle = expect_context();
    let Selected(selected) = expect_context();
    let Cities(cities) = expect_context();

    Effect::new(move || {
        let Some(name) = selected.get() else {
            return;
        };
        if let Some(index) = cities.with_value(|registry| registry.index_of(&name)) {
            reveal_entry(index);
        }
    });

    let total = cities.with_value(|registry| registry.total_count());
    let entries = cities
        .with_value(|registry| registry.all().to_vec())
        .into_iter()
        .enumerate()
        .map(|(index, city)| {
            let label = city.label();
            let name = city.name.clone();
            view! {
                <li
                    data-city-idx={index.to_string()}
                    class:selected=move || selected.with(|s| s.as_deref() == Some(name.as_str()))
                    on:click=move |_| selection.select_city(&city)
                >
                    {label}
                </li>
            }
        })
        .collect_view();

    view! {
        <aside class="sidebar">
            <h2>{title}</h2>
            <ul class="city-list">{entries}</ul>
            <div class="sidebar-total">{format!("Total suspects: {total}")}</div>
        </aside>
    }
}
