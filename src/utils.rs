//! 与浏览器环境相关的辅助工具。

pub fn set_panic_hook() {
    // 让 panic 信息输出到浏览器控制台。
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// 写入浏览器控制台；非 wasm 目标（如本地单元测试）下为空操作。
pub fn log(message: &str) {
    #[cfg(target_arch = "wasm32")]
    web_sys::console::log_1(&message.into());

    #[cfg(not(target_arch = "wasm32"))]
    let _ = message;
}

#[macro_export]
macro_rules! console_log {
    ($($arg:tt)*) => {
        $crate::utils::log(&format!($($arg)*))
    };
}
