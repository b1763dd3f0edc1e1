pub fn escape_selector(selector: &str) -> String {
    selector.replace('\\', "\\\\").replace('\'', "\\'")
}

pub const READY_STATE: &str = "document.readyState";

/// Scroll position and document/viewport heights, as `{ y, height, viewport }`.
pub const PAGE_GEOMETRY: &str = r#"(function(){const d=document.documentElement;const b=document.body;const height=Math.max(d?d.scrollHeight:0,b?b.scrollHeight:0);return{y:Math.ceil(window.scrollY||window.pageYOffset||0),height:height,viewport:window.innerHeight||0}})()"#;

pub const HIDE_WEBDRIVER: &str = r#"Object.defineProperty(navigator,'webdriver',{get:()=>undefined});window.chrome=window.chrome||{runtime:{}};Object.defineProperty(navigator,'languages',{get:()=>['en-ZA','en-US','en']});Object.defineProperty(navigator,'plugins',{get:()=>[1,2,3,4,5]});"#;

pub fn scroll_by(pixels: u32) -> String {
    format!("window.scrollBy(0,{})", pixels)
}

/// Clicks the first visible element matching `selector`; resolves to whether a click happened.
pub fn click_if_visible(selector: &str) -> String {
    let escaped = escape_selector(selector);
    format!(
        r#"(function(){{const el=document.querySelector('{}');if(!el)return false;const style=window.getComputedStyle(el);const rect=el.getBoundingClientRect();if(style.display==='none'||style.visibility==='hidden'||rect.width===0||rect.height===0)return false;el.click();return true}})()"#,
        escaped
    )
}
