//! Embedded HTML/CSS/JS frontend for the speckle-activity web dashboard.
//!
//! The entire page is compiled into the binary as a string constant.
//! No external assets, no build tools, no CDN dependencies: charts are
//! plain CSS bars, conic-gradient donuts and an inline SVG line.

/// The complete single-page dashboard HTML.
pub const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Speckle Stream Activity</title>
<style>
:root {
  --bg: #0d1117;
  --surface: #161b22;
  --border: #30363d;
  --text: #e6edf3;
  --text-muted: #8b949e;
  --accent: #58a6ff;
  --green: #3fb950;
  --yellow: #d29922;
  --red: #f85149;
  --purple: #bc8cff;
  --cyan: #39d2c0;
  --radius: 8px;
  --font: -apple-system, BlinkMacSystemFont, 'Segoe UI', Helvetica, Arial, sans-serif;
  --mono: 'SF Mono', 'Cascadia Code', 'Fira Code', monospace;
}

* { margin: 0; padding: 0; box-sizing: border-box; }
body {
  background: var(--bg);
  color: var(--text);
  font-family: var(--font);
  font-size: 14px;
  line-height: 1.5;
}

/* Layout */
.app {
  max-width: 1200px;
  margin: 0 auto;
  padding: 24px;
}

header {
  display: flex;
  align-items: center;
  justify-content: space-between;
  margin-bottom: 24px;
  padding-bottom: 16px;
  border-bottom: 1px solid var(--border);
}

header h1 {
  font-size: 24px;
  font-weight: 600;
  display: flex;
  align-items: center;
  gap: 10px;
}

header .subtitle {
  color: var(--text-muted);
  font-size: 13px;
}

details.about {
  margin-bottom: 16px;
  color: var(--text-muted);
}
details.about summary { cursor: pointer; color: var(--text); font-weight: 500; }
details.about p { margin-top: 8px; }

/* Cards */
.card {
  background: var(--surface);
  border: 1px solid var(--border);
  border-radius: var(--radius);
  padding: 20px;
  margin-bottom: 16px;
}

.card h2 {
  font-size: 16px;
  font-weight: 600;
  margin-bottom: 16px;
}

.card h3 {
  font-size: 14px;
  font-weight: 600;
  margin-bottom: 12px;
  color: var(--text-muted);
}

/* Inputs */
.inputs {
  display: grid;
  grid-template-columns: 1fr 1fr auto;
  gap: 12px;
  align-items: end;
}

.field label {
  display: block;
  font-size: 12px;
  color: var(--text-muted);
  margin-bottom: 4px;
  text-transform: uppercase;
  letter-spacing: 0.5px;
}

.field input, .field select {
  width: 100%;
  padding: 8px 10px;
  background: var(--bg);
  border: 1px solid var(--border);
  border-radius: 6px;
  color: var(--text);
  font-size: 13px;
  font-family: var(--mono);
}

.field input:focus, .field select:focus { outline: none; border-color: var(--accent); }

.stream-row { margin-top: 12px; }

.btn {
  padding: 8px 18px;
  border: 1px solid var(--border);
  border-radius: 6px;
  background: var(--accent);
  color: #fff;
  font-size: 13px;
  font-weight: 600;
  cursor: pointer;
}
.btn:disabled { opacity: 0.5; cursor: wait; }

/* Status */
.notice {
  padding: 12px 16px;
  border-radius: var(--radius);
  border: 1px solid var(--border);
  margin-bottom: 16px;
  color: var(--text-muted);
}
.notice.error { border-color: var(--red); color: var(--red); }
.notice.warn { border-color: var(--yellow); color: var(--yellow); }

/* Viewer */
.viewer iframe {
  width: 100%;
  border: 1px solid var(--border);
  border-radius: 6px;
  background: #fff;
}
.viewer .meta { color: var(--text-muted); font-size: 12px; margin-top: 8px; font-family: var(--mono); }

/* Metrics */
.stats-grid {
  display: grid;
  grid-template-columns: repeat(auto-fit, minmax(200px, 1fr));
  gap: 16px;
  margin-bottom: 16px;
}

.stat-card {
  background: var(--surface);
  border: 1px solid var(--border);
  border-radius: var(--radius);
  padding: 20px;
}

.stat-card .value {
  font-size: 32px;
  font-weight: 700;
  font-family: var(--mono);
  color: var(--accent);
  line-height: 1.1;
}
.stat-card .value.green { color: var(--green); }
.stat-card .value.purple { color: var(--purple); }
.stat-card .value.cyan { color: var(--cyan); }

.stat-card .label {
  font-size: 12px;
  color: var(--text-muted);
  margin-top: 6px;
  text-transform: uppercase;
  letter-spacing: 0.5px;
}

.stat-card ul {
  margin-top: 10px;
  padding-left: 18px;
  color: var(--text-muted);
  font-size: 12px;
  max-height: 120px;
  overflow-y: auto;
}

/* Charts */
.charts {
  display: grid;
  grid-template-columns: 1fr 1fr;
  gap: 16px;
}

.bar-row {
  display: grid;
  grid-template-columns: 160px 1fr 48px;
  gap: 8px;
  align-items: center;
  margin-bottom: 6px;
  font-size: 12px;
}
.bar-row .name { overflow: hidden; text-overflow: ellipsis; white-space: nowrap; font-family: var(--mono); }
.bar-row .track { background: var(--bg); border-radius: 4px; height: 16px; overflow: hidden; }
.bar-row .fill { background: var(--accent); height: 100%; transition: width 0.4s; }
.bar-row .count { text-align: right; font-family: var(--mono); color: var(--text-muted); }

.donut-wrap { display: flex; gap: 20px; align-items: center; }
.donut {
  width: 140px;
  height: 140px;
  border-radius: 50%;
  position: relative;
  flex-shrink: 0;
}
.donut::after {
  content: '';
  position: absolute;
  inset: 30px;
  background: var(--surface);
  border-radius: 50%;
}
.legend { list-style: none; font-size: 12px; }
.legend li { display: flex; align-items: center; gap: 6px; margin-bottom: 4px; }
.legend .swatch { width: 10px; height: 10px; border-radius: 2px; display: inline-block; }
.legend .pct { color: var(--text-muted); font-family: var(--mono); }

.timeline svg { width: 100%; height: 220px; }
.timeline .axis { stroke: var(--border); }
.timeline .line { fill: none; stroke: var(--cyan); stroke-width: 2; }
.timeline .dot { fill: var(--cyan); }
.timeline text { fill: var(--text-muted); font-size: 10px; font-family: var(--mono); }

.hidden { display: none; }

@media (max-width: 800px) {
  .inputs, .charts { grid-template-columns: 1fr; }
}
</style>
</head>
<body>
<div class="app">

  <header>
    <div>
      <h1><span id="page-icon"></span> <span id="page-title">Speckle Stream Activity</span></h1>
      <div class="subtitle" id="account"></div>
    </div>
  </header>

  <details class="about">
    <summary>About this app</summary>
    <p id="about-text"></p>
  </details>

  <div class="card">
    <h2>Inputs</h2>
    <div class="inputs">
      <div class="field">
        <label for="server">Server URL</label>
        <input id="server" type="text" placeholder="speckle.xyz">
      </div>
      <div class="field">
        <label for="token">Access token</label>
        <input id="token" type="password" placeholder="personal access token" autocomplete="off">
      </div>
      <button class="btn" id="btn-connect">Connect</button>
    </div>
    <div class="field stream-row hidden" id="stream-row">
      <label for="stream">Stream</label>
      <select id="stream"></select>
    </div>
  </div>

  <div class="notice" id="notice">Enter your server URL and access token to get started.</div>

  <div id="dashboard" class="hidden">
    <div class="card viewer">
      <h2>Latest Commit</h2>
      <iframe id="viewer" title="Speckle viewer" loading="lazy"></iframe>
      <div class="meta" id="viewer-meta"></div>
    </div>

    <div class="stats-grid">
      <div class="stat-card">
        <div class="value" id="m-branches">0</div>
        <div class="label">Branches</div>
        <ul id="l-branches"></ul>
      </div>
      <div class="stat-card">
        <div class="value green" id="m-commits">0</div>
        <div class="label">Commits</div>
      </div>
      <div class="stat-card">
        <div class="value purple" id="m-connectors">0</div>
        <div class="label">Connectors</div>
        <ul id="l-connectors"></ul>
      </div>
      <div class="stat-card">
        <div class="value cyan" id="m-contributors">0</div>
        <div class="label">Contributors</div>
        <ul id="l-contributors"></ul>
      </div>
    </div>

    <div class="charts">
      <div class="card">
        <h3>Commits per Branch</h3>
        <div id="chart-branches"></div>
      </div>
      <div class="card">
        <h3>Connectors</h3>
        <div id="chart-apps" class="donut-wrap"></div>
      </div>
      <div class="card">
        <h3>Authors</h3>
        <div id="chart-authors" class="donut-wrap"></div>
      </div>
      <div class="card timeline">
        <h3>Commit Activity</h3>
        <div id="chart-timeline"></div>
      </div>
    </div>
  </div>

</div>

<script>
// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------
const PALETTE = ['#58a6ff', '#3fb950', '#bc8cff', '#39d2c0', '#d29922', '#f85149', '#ff7b72', '#a5d6ff'];
let selectedStream = null;
let busy = false;

// ---------------------------------------------------------------------------
// API helpers
// ---------------------------------------------------------------------------
async function api(method, path, body) {
  const opts = { method, headers: {} };
  if (body) {
    opts.headers['Content-Type'] = 'application/json';
    opts.body = JSON.stringify(body);
  }
  const res = await fetch(path, opts);
  const data = await res.json();
  if (!res.ok) {
    const err = new Error(data.error || res.statusText);
    err.kind = data.kind;
    throw err;
  }
  return data;
}

function esc(s) {
  const d = document.createElement('div');
  d.textContent = s === undefined || s === null ? '' : String(s);
  return d.innerHTML;
}

function fmt(n) {
  if (n === undefined || n === null) return '-';
  return n.toLocaleString();
}

function show(id, visible) {
  document.getElementById(id).classList.toggle('hidden', !visible);
}

function notice(msg, cls) {
  const el = document.getElementById('notice');
  el.textContent = msg;
  el.className = 'notice' + (cls ? ' ' + cls : '');
  show('notice', true);
}

// ---------------------------------------------------------------------------
// Render pass
// ---------------------------------------------------------------------------
async function render() {
  if (busy) return;
  busy = true;
  document.getElementById('btn-connect').disabled = true;
  notice('Loading…');

  const body = {
    server: document.getElementById('server').value.trim(),
    token: document.getElementById('token').value.trim(),
  };
  if (selectedStream) body.stream = selectedStream;

  try {
    const state = await api('POST', '/api/render', body);
    applyState(state);
  } catch (e) {
    show('dashboard', false);
    const hint = {
      auth: 'Check the access token.',
      not_found: 'Pick another stream.',
      empty_data: 'This stream has no commits yet.',
      network: 'Is the server reachable?',
    }[e.kind] || '';
    notice(e.message + (hint ? ' ' + hint : ''), 'error');
  } finally {
    busy = false;
    document.getElementById('btn-connect').disabled = false;
  }
}

function applyState(state) {
  if (state.header) applyHeader(state.header);

  switch (state.state) {
    case 'awaiting_credentials':
      show('dashboard', false);
      show('stream-row', false);
      notice('Enter your server URL and access token to get started.', 'warn');
      break;

    case 'awaiting_stream_selection': {
      document.getElementById('account').textContent =
        'Signed in as ' + state.account.name + ' on ' + state.server;
      const names = state.streams.map(s => s.name);
      fillStreams(names, null);
      if (names.length === 0) {
        show('dashboard', false);
        notice('No streams are visible to this account.', 'warn');
        break;
      }
      // Default to the first stream, like a select box does.
      selectedStream = names[0];
      document.getElementById('stream').value = selectedStream;
      setTimeout(render, 0);
      break;
    }

    case 'loaded':
      applyView(state.view);
      break;
  }
}

function applyHeader(header) {
  document.title = header.tab_title;
  document.getElementById('page-icon').textContent = header.icon;
  document.getElementById('page-title').textContent = header.title;
  document.getElementById('about-text').textContent = header.about;
}

function fillStreams(names, selected) {
  const select = document.getElementById('stream');
  select.innerHTML = names.map(n => `<option value="${esc(n)}">${esc(n)}</option>`).join('');
  if (selected) select.value = selected;
  show('stream-row', names.length > 0);
}

// ---------------------------------------------------------------------------
// Loaded view
// ---------------------------------------------------------------------------
function applyView(view) {
  applyHeader(view.header);
  fillStreams(view.inputs.stream_names, view.inputs.stream_name);
  selectedStream = view.inputs.stream_name;
  show('notice', false);
  show('dashboard', true);

  // Viewer
  const iframe = document.getElementById('viewer');
  if (iframe.src !== view.viewer.embed_url) iframe.src = view.viewer.embed_url;
  iframe.height = view.viewer.height;
  const c = view.viewer.commit;
  document.getElementById('viewer-meta').textContent =
    `${c.id} · ${c.author_name} · ${c.source_application} · ${new Date(c.created_at).toLocaleString()}`;

  // Report
  const r = view.report;
  document.getElementById('m-branches').textContent = fmt(r.branch_count);
  document.getElementById('m-commits').textContent = fmt(r.commit_count);
  document.getElementById('m-connectors').textContent = fmt(r.connectors.count);
  document.getElementById('m-contributors').textContent = fmt(r.contributors.count);
  fillList('l-branches', view.graphs.branch_commits.map(b => b.branch));
  fillList('l-connectors', r.connectors.items);
  fillList('l-contributors', r.contributors.items);

  // Graphs
  drawBars('chart-branches', view.graphs.branch_commits);
  drawDonut('chart-apps', view.graphs.applications);
  drawDonut('chart-authors', view.graphs.authors);
  drawTimeline('chart-timeline', view.graphs.timeline);
}

function fillList(id, items) {
  document.getElementById(id).innerHTML = items.map(i => `<li>${esc(i)}</li>`).join('');
}

// ---------------------------------------------------------------------------
// Charts
// ---------------------------------------------------------------------------
function drawBars(id, rows) {
  const max = Math.max(1, ...rows.map(r => r.commit_count));
  document.getElementById(id).innerHTML = rows.map(r => `
    <div class="bar-row">
      <span class="name" title="${esc(r.branch)}">${esc(r.branch)}</span>
      <span class="track"><span class="fill" style="display:block;width:${(r.commit_count / max) * 100}%"></span></span>
      <span class="count">${fmt(r.commit_count)}</span>
    </div>`).join('');
}

function drawDonut(id, shares) {
  const total = shares.reduce((sum, s) => sum + s.count, 0);
  let start = 0;
  const stops = shares.map((s, i) => {
    const end = start + (total ? (s.count / total) * 360 : 0);
    const stop = `${PALETTE[i % PALETTE.length]} ${start}deg ${end}deg`;
    start = end;
    return stop;
  });
  const legend = shares.map((s, i) => `
    <li><span class="swatch" style="background:${PALETTE[i % PALETTE.length]}"></span>
      ${esc(s.label)} <span class="pct">${fmt(s.count)} (${total ? ((s.count / total) * 100).toFixed(1) : '0.0'}%)</span></li>`).join('');
  document.getElementById(id).innerHTML = `
    <div class="donut" style="background:conic-gradient(${stops.join(', ') || 'var(--border) 0deg 360deg'})"></div>
    <ul class="legend">${legend}</ul>`;
}

function drawTimeline(id, days) {
  const W = 520, H = 200, PAD = 28;
  const max = Math.max(1, ...days.map(d => d.count));
  const step = days.length > 1 ? (W - 2 * PAD) / (days.length - 1) : 0;
  const pts = days.map((d, i) => {
    const x = days.length > 1 ? PAD + i * step : W / 2;
    const y = H - PAD - (d.count / max) * (H - 2 * PAD);
    return [x, y, d];
  });
  const line = pts.map(p => `${p[0].toFixed(1)},${p[1].toFixed(1)}`).join(' ');
  const dots = days.length <= 60
    ? pts.map(p => `<circle class="dot" cx="${p[0].toFixed(1)}" cy="${p[1].toFixed(1)}" r="2.5"><title>${esc(p[2].date)}: ${p[2].count}</title></circle>`).join('')
    : '';
  const first = days.length ? days[0].date : '';
  const last = days.length ? days[days.length - 1].date : '';
  document.getElementById(id).innerHTML = `
    <svg viewBox="0 0 ${W} ${H}" preserveAspectRatio="none">
      <line class="axis" x1="${PAD}" y1="${H - PAD}" x2="${W - PAD}" y2="${H - PAD}"></line>
      <line class="axis" x1="${PAD}" y1="${PAD}" x2="${PAD}" y2="${H - PAD}"></line>
      <text x="${PAD}" y="${H - 8}">${esc(first)}</text>
      <text x="${W - PAD}" y="${H - 8}" text-anchor="end">${esc(last)}</text>
      <text x="${PAD - 4}" y="${PAD + 4}" text-anchor="end">${max}</text>
      <polyline class="line" points="${line}"></polyline>
      ${dots}
    </svg>`;
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------
document.getElementById('btn-connect').addEventListener('click', () => {
  selectedStream = null;
  render();
});

document.getElementById('token').addEventListener('keydown', e => {
  if (e.key === 'Enter') {
    selectedStream = null;
    render();
  }
});

document.getElementById('stream').addEventListener('change', e => {
  selectedStream = e.target.value;
  render();
});

async function init() {
  try {
    const cfg = await api('GET', '/api/config');
    document.getElementById('server').value = cfg.config.server.url;
    applyHeader({
      tab_title: cfg.config.dashboard.page_title_tab,
      title: cfg.config.dashboard.page_title_header,
      icon: cfg.config.dashboard.page_icon,
      about: cfg.config.dashboard.about,
    });
    if (cfg.has_token) {
      document.getElementById('token').placeholder = 'using configured token';
      render();
    }
  } catch (e) {
    notice('Could not load configuration: ' + e.message, 'error');
  }
}

init();
</script>
</body>
</html>
"##;
