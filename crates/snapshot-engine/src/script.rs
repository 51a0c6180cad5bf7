//! In-page enumeration script.
//!
//! Runs in the page main world. Walks the main document plus same-origin
//! iframe documents (BFS, visited set keyed by document identity) and open
//! shadow roots, stamps every kept element with `data-gaia-dom-ref`, and
//! returns descriptor objects. Cross-origin frames are skipped.

/// Returns an array of element descriptors:
/// `{tag, dom_ref, selector, text, attributes, bounding_box, element_type,
///   frame_index, frame_name, is_main_frame, frame_selector}`.
pub const ENUMERATE_ELEMENTS_JS: &str = r#"
(() => {
    const results = [];
    let gaiaRefSeq = 0;
    const stamp = Date.now().toString(36);

    const frames = [];
    const seenDocs = new Set();
    const queue = [{ doc: document, index: 0, name: '', selector: '', isMain: true }];
    seenDocs.add(document);
    let nextFrameIndex = 1;
    while (queue.length > 0) {
        const entry = queue.shift();
        frames.push(entry);
        let iframes = [];
        try {
            iframes = Array.from(entry.doc.querySelectorAll('iframe'));
        } catch (_) {
            iframes = [];
        }
        for (let i = 0; i < iframes.length; i++) {
            const el = iframes[i];
            let child = null;
            try {
                child = el.contentDocument;
            } catch (_) {
                child = null;
            }
            if (!child || seenDocs.has(child)) continue;
            seenDocs.add(child);
            const name = el.getAttribute('name') || '';
            const frameSelector = name
                ? 'iframe[name="' + name + '"]'
                : 'iframe:nth-of-type(' + (i + 1) + ')';
            queue.push({
                doc: child,
                index: nextFrameIndex++,
                name: name || ('frame_' + frames.length),
                selector: entry.selector ? entry.selector + ' >>> ' + frameSelector : frameSelector,
                isMain: false
            });
        }
    }

    const scanRootsOf = (doc) => {
        const roots = [doc];
        const seen = new Set([doc]);
        const pending = [doc];
        while (pending.length > 0) {
            const root = pending.shift();
            let nodes = [];
            try {
                nodes = Array.from(root.querySelectorAll('*'));
            } catch (_) {
                nodes = [];
            }
            for (const node of nodes) {
                if (!node || !node.shadowRoot) continue;
                if (seen.has(node.shadowRoot)) continue;
                seen.add(node.shadowRoot);
                roots.push(node.shadowRoot);
                pending.push(node.shadowRoot);
            }
        }
        return roots;
    };

    for (const frame of frames) {
        const doc = frame.doc;
        const win = doc.defaultView || window;
        const scanRoots = scanRootsOf(doc);
        const seenEls = new Set();

        const queryAll = (selector) => {
            const out = [];
            for (const root of scanRoots) {
                let found = [];
                try {
                    found = Array.from(root.querySelectorAll(selector));
                } catch (_) {
                    continue;
                }
                for (const el of found) {
                    if (!el || seenEls.has(el)) continue;
                    seenEls.add(el);
                    out.push(el);
                }
            }
            return out;
        };

        const isVisible = (el) => {
            const style = win.getComputedStyle(el);
            return style.display !== 'none' && style.visibility !== 'hidden';
        };

        const assignDomRef = (el) => {
            const existing = (el.getAttribute('data-gaia-dom-ref') || '').trim();
            if (existing) return existing;
            const tag = (el.tagName || 'el').toLowerCase();
            const ref = 'gaia-' + tag + '-' + stamp + '-' + (gaiaRefSeq++);
            try { el.setAttribute('data-gaia-dom-ref', ref); } catch (_) {}
            return ref;
        };

        const uniqueSelector = (el) => {
            if (el.id) {
                if (win.CSS && typeof win.CSS.escape === 'function') {
                    return '#' + win.CSS.escape(el.id);
                }
                return el.tagName.toLowerCase() + '[id="' + el.id + '"]';
            }
            if (el.name) return el.tagName.toLowerCase() + '[name="' + el.name + '"]';
            if (el.dataset && el.dataset.testid) return '[data-testid="' + el.dataset.testid + '"]';
            const ariaLabel = el.getAttribute('aria-label');
            if (ariaLabel) return el.tagName.toLowerCase() + '[aria-label="' + ariaLabel + '"]';
            if (el.tagName === 'INPUT' && el.placeholder) {
                return el.tagName.toLowerCase() + '[placeholder="' + el.placeholder + '"]';
            }
            const text = el.innerText ? el.innerText.trim() : '';
            if (text && text.length < 50) {
                return el.tagName.toLowerCase() + ':has-text("' + text + '")';
            }
            if (el.className && typeof el.className === 'string') {
                const classes = el.className.split(' ').filter((c) =>
                    c &&
                    !c.match(/^(active|hover|focus|selected)/) &&
                    !c.match(/^(sc-|css-|makeStyles-|emotion-)/)
                );
                if (classes.length > 0) {
                    return el.tagName.toLowerCase() + '.' + classes.slice(0, 2).join('.');
                }
            }
            const parent = el.parentElement;
            if (parent) {
                const index = Array.from(parent.children).indexOf(el) + 1;
                return el.tagName.toLowerCase() + ':nth-child(' + index + ')';
            }
            return el.tagName.toLowerCase();
        };

        const box = (el) => {
            const rect = el.getBoundingClientRect();
            return {
                x: rect.x,
                y: rect.y,
                width: rect.width,
                height: rect.height,
                center_x: rect.x + rect.width / 2,
                center_y: rect.y + rect.height / 2
            };
        };

        const push = (el, text, attributes, elementType) => {
            const attrs = {};
            for (const [key, value] of Object.entries(attributes)) {
                if (value === null || value === undefined) continue;
                const str = String(value).trim();
                if (str) attrs[key] = str;
            }
            const selector = uniqueSelector(el);
            results.push({
                tag: el.tagName.toLowerCase(),
                dom_ref: assignDomRef(el),
                selector: selector,
                text: text ? String(text).slice(0, 180) : '',
                attributes: attrs,
                bounding_box: box(el),
                element_type: elementType,
                frame_index: frame.index,
                frame_name: frame.name,
                is_main_frame: frame.isMain,
                full_selector: frame.selector ? frame.selector + ' >>> ' + selector : selector
            });
        };

        queryAll('input, textarea, select').forEach((el) => {
            if (!isVisible(el)) return;
            push(el, '', {
                type: el.type || 'text',
                id: el.id,
                name: el.name,
                placeholder: el.placeholder,
                'aria-label': el.getAttribute('aria-label'),
                title: el.getAttribute('title')
            }, 'input');
        });

        queryAll([
            'button',
            'a:not([href])',
            '[role="button"]',
            '[role="tab"]',
            '[role="menuitem"]',
            '[role="menuitemcheckbox"]',
            '[role="menuitemradio"]',
            '[role="option"]',
            '[role="radio"]',
            '[role="checkbox"]',
            '[role="switch"]',
            '[role="treeitem"]',
            '[role="link"]',
            '[type="submit"]',
            'input[type="button"]'
        ].join(',')).forEach((el) => {
            if (!isVisible(el)) return;
            let text = (el.innerText ? el.innerText.trim() : '') || el.value || '';
            if (!text) text = el.getAttribute('aria-label') || el.getAttribute('title') || '';
            if (!text) {
                const svg = el.querySelector('svg');
                if (svg) text = svg.getAttribute('aria-label') || svg.getAttribute('title') || '[icon]';
            }
            if (el.getAttribute('role') === 'switch' && (!text || text === 'on' || text === 'off')) {
                const container = el.parentElement && el.parentElement.parentElement;
                const label = container && container.querySelector('label');
                if (label && label.innerText) text = label.innerText.trim();
            }
            push(el, text, {
                type: el.type || 'button',
                'aria-label': el.getAttribute('aria-label'),
                title: el.getAttribute('title'),
                role: el.getAttribute('role')
            }, 'button');
        });

        queryAll('[onclick], [class*="btn"], [class*="button"], [class*="cursor-pointer"]').forEach((el) => {
            if (!isVisible(el)) return;
            if (el.tagName === 'BUTTON') return;
            if (el.tagName === 'A' && el.hasAttribute('href')) return;
            const style = win.getComputedStyle(el);
            if (style.cursor === 'pointer' || el.onclick) {
                const text = el.innerText ? el.innerText.trim() : '';
                if (text && text.length < 100) {
                    push(el, text, {
                        'aria-label': el.getAttribute('aria-label'),
                        title: el.getAttribute('title')
                    }, 'clickable');
                }
            }
        });

        queryAll('a[href]').forEach((el) => {
            if (!isVisible(el)) return;
            let text = el.innerText ? el.innerText.trim() : '';
            if (!text) {
                const img = el.querySelector('img');
                text = (img && img.getAttribute('alt')) ||
                    el.getAttribute('aria-label') ||
                    el.getAttribute('title') ||
                    '[link]';
            }
            push(el, text, {
                href: el.href,
                'aria-label': el.getAttribute('aria-label'),
                title: el.getAttribute('title')
            }, 'link');
        });

        queryAll([
            '[aria-controls]',
            '[aria-expanded]',
            '[aria-haspopup]',
            '[tabindex]:not([tabindex="-1"])',
            '[data-testid]',
            '[data-test]',
            '[data-qa]',
            '[contenteditable="true"]',
            'summary'
        ].join(',')).forEach((el) => {
            if (!isVisible(el) || !el.tagName) return;
            const tag = el.tagName.toLowerCase();
            if (['html', 'body', 'head', 'meta', 'style', 'script', 'link'].includes(tag)) return;
            const role = (el.getAttribute('role') || '').trim().toLowerCase();
            const ariaLabel = (el.getAttribute('aria-label') || '').trim();
            const title = (el.getAttribute('title') || '').trim();
            const text = (el.innerText || '').trim();
            const testid = (el.getAttribute('data-testid') || '').trim() ||
                (el.getAttribute('data-test') || '').trim() ||
                (el.getAttribute('data-qa') || '').trim();
            const pointerLike = win.getComputedStyle(el).cursor === 'pointer';
            const rect = box(el);
            const hasSignal = !!role || !!ariaLabel || !!title || !!testid || pointerLike ||
                (text && text.length <= 180);
            if (!hasSignal) return;
            if (rect.width <= 0 || rect.height <= 0) return;
            push(el, text, {
                role: role,
                'aria-label': ariaLabel,
                title: title,
                placeholder: el.getAttribute('placeholder'),
                'aria-controls': el.getAttribute('aria-controls'),
                'aria-expanded': el.getAttribute('aria-expanded'),
                'aria-haspopup': el.getAttribute('aria-haspopup'),
                tabindex: el.getAttribute('tabindex'),
                'data-testid': testid
            }, 'semantic');
        });
    }

    return results;
})()
"#;

/// Counts documents reachable from the main world, mirroring the frame walk
/// of the enumeration script. Used for live frame-scope validation.
pub const COUNT_FRAMES_JS: &str = r#"
(() => {
    const seen = new Set([document]);
    const queue = [document];
    let count = 0;
    while (queue.length > 0) {
        const doc = queue.shift();
        count += 1;
        let iframes = [];
        try {
            iframes = Array.from(doc.querySelectorAll('iframe'));
        } catch (_) {
            iframes = [];
        }
        for (const el of iframes) {
            let child = null;
            try { child = el.contentDocument; } catch (_) { child = null; }
            if (child && !seen.has(child)) {
                seen.add(child);
                queue.push(child);
            }
        }
    }
    return count;
})()
"#;
