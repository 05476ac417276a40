//! Client-side navigation hook prepended to every rewritten HTML document.
//!
//! The script wraps `fetch` and `XMLHttpRequest.prototype.open` so absolute
//! `http(s)` URLs that do not already point at the proxy are prefixed with the
//! proxy origin. 800ms after `load` it clicks the first anchor that looks like
//! an interstitial "continue" link.

/// Keywords that mark an interstitial continue/redirect link.
pub const CONTINUE_KEYWORDS: [&str; 5] = ["继续访问", "continue", "redirect", "跳转", "进入"];

/// Element id that always marks a continue link.
pub const CONTINUE_ELEMENT_ID: &str = "click-to-continue";

/// Delay before scanning for continue links, in milliseconds.
pub const CONTINUE_DELAY_MS: u32 = 800;

/// Raw markup inserted at the top of `<head>`.
pub const CLIENT_SCRIPT: &str = r#"<script>
(function () {
  var proxyOrigin = window.location.origin;
  var viaProxy = function (url) {
    if (typeof url === 'string' && url.indexOf('http') === 0 && url.indexOf(proxyOrigin) !== 0) {
      return proxyOrigin + '/' + url;
    }
    return url;
  };

  var nativeFetch = window.fetch;
  if (nativeFetch) {
    window.fetch = function (input, init) {
      return nativeFetch.call(this, viaProxy(input), init);
    };
  }

  var nativeOpen = XMLHttpRequest.prototype.open;
  XMLHttpRequest.prototype.open = function (method, url) {
    var args = Array.prototype.slice.call(arguments);
    args[1] = viaProxy(url);
    return nativeOpen.apply(this, args);
  };

  window.addEventListener('load', function () {
    setTimeout(function () {
      var keywords = ['继续访问', 'continue', 'redirect', '跳转', '进入'];
      var anchors = document.getElementsByTagName('a');
      for (var i = 0; i < anchors.length; i++) {
        var a = anchors[i];
        var text = (a.innerText || '').toLowerCase();
        var hit = a.id === 'click-to-continue' || keywords.some(function (k) { return text.indexOf(k) !== -1; });
        if (hit) {
          a.click();
          break;
        }
      }
    }, 800);
  });
})();
</script>"#;
